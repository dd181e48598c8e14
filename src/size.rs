//! Recursive on-disk size computation for plugin directories.
//!
//! [`scan`] walks a directory with `walkdir`, sums every regular file (and
//! every file a symlink points at) and
//! buckets the bytes by the file's containing directory (relative to the
//! scan root, the root itself keyed as `/`). I/O failures on individual
//! entries never abort the report: they are logged and returned as
//! [`ScanError`] diagnostics next to the partial totals.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::model::{SizeInfo, SubdirectorySize};

const KB: u64 = 1 << 10;
const MB: u64 = 1 << 20;
const GB: u64 = 1 << 30;

/// Key used for files directly inside the scanned directory.
pub const ROOT_KEY: &str = "/";

/// A filesystem error hit while walking a plugin directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("cannot read {}: {message}", .path.display())]
    Walk { path: PathBuf, message: String },

    #[error("cannot stat {}: {message}", .path.display())]
    Metadata { path: PathBuf, message: String },
}

impl ScanError {
    pub fn path(&self) -> &Path {
        match self {
            ScanError::Walk { path, .. } | ScanError::Metadata { path, .. } => path,
        }
    }
}

/// Result of one directory scan: the size info plus any per-entry failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeScan {
    pub info: SizeInfo,
    pub diagnostics: Vec<ScanError>,
}

impl SizeScan {
    pub fn is_partial(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Scans `directory` and returns its size breakdown.
///
/// A missing path, or a path that is not a directory, yields an empty
/// [`SizeInfo`] without diagnostics.
pub fn scan(directory: &Path) -> SizeScan {
    if !directory.is_dir() {
        return SizeScan::default();
    }

    let entries = WalkDir::new(directory)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(
                entry
                    .metadata()
                    .map(|m| (entry.path().to_path_buf(), m.len()))
                    .map_err(|e| ScanError::Metadata {
                        path: entry.path().to_path_buf(),
                        message: e.to_string(),
                    }),
            ),
            Ok(entry) if entry.file_type().is_symlink() => symlink_size(entry.path()),
            Ok(_) => None,
            Err(e) => Some(Err(ScanError::Walk {
                path: e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| directory.to_path_buf()),
                message: e.to_string(),
            })),
        });

    tally(directory, entries)
}

/// Size of the file a symlink points at; links to directories count nothing.
///
/// The link is not descended into, so a link back into the tree cannot loop.
fn symlink_size(link: &Path) -> Option<Result<(PathBuf, u64), ScanError>> {
    match fs::metadata(link) {
        Ok(target) if target.is_file() => Some(Ok((link.to_path_buf(), target.len()))),
        Ok(_) => None,
        Err(e) => Some(Err(ScanError::Metadata {
            path: link.to_path_buf(),
            message: e.to_string(),
        })),
    }
}

/// Folds walked file entries into a [`SizeScan`].
fn tally<I>(root: &Path, entries: I) -> SizeScan
where
    I: IntoIterator<Item = Result<(PathBuf, u64), ScanError>>,
{
    let mut total = 0u64;
    let mut by_dir: BTreeMap<String, u64> = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for entry in entries {
        match entry {
            Ok((path, len)) => {
                total += len;
                *by_dir.entry(directory_key(root, &path)).or_insert(0) += len;
            }
            Err(err) => {
                warn!(root = %root.display(), "size scan: {}", err);
                diagnostics.push(err);
            }
        }
    }

    let mut subdirectory_sizes: Vec<SubdirectorySize> = by_dir
        .into_iter()
        .map(|(path, size_bytes)| SubdirectorySize { path, size_bytes })
        .collect();
    // Stable: equal sizes keep path order from the BTreeMap.
    subdirectory_sizes.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));

    SizeScan {
        info: SizeInfo {
            total_size_bytes: total,
            subdirectory_sizes,
            human_readable: human_readable(total),
        },
        diagnostics,
    }
}

/// Directory of `file` relative to `root`, `/`-separated; `/` for the root.
fn directory_key(root: &Path, file: &Path) -> String {
    let relative = file
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    if relative.is_empty() {
        ROOT_KEY.to_string()
    } else {
        relative
    }
}

/// Formats a byte count the way the report displays it.
///
/// Values of a kilobyte and above use binary units with two decimals,
/// rounded half-up:
///
/// ```
/// use plugin_reporter::size::human_readable;
///
/// assert_eq!(human_readable(0), "0 bytes");
/// assert_eq!(human_readable(1), "1 byte");
/// assert_eq!(human_readable(1536), "1.50 KB");
/// ```
pub fn human_readable(bytes: u64) -> String {
    match bytes {
        b if b >= GB => scaled(b, GB, "GB"),
        b if b >= MB => scaled(b, MB, "MB"),
        b if b >= KB => scaled(b, KB, "KB"),
        0 => "0 bytes".to_string(),
        1 => "1 byte".to_string(),
        b => format!("{} bytes", b),
    }
}

fn scaled(bytes: u64, unit: u64, suffix: &str) -> String {
    // Integer arithmetic keeps x.xx5 ties rounding up.
    let unit = unit as u128;
    let hundredths = (bytes as u128 * 100 + unit / 2) / unit;
    format!("{}.{:02} {}", hundredths / 100, hundredths % 100, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_human_readable_thresholds() {
        assert_eq!(human_readable(0), "0 bytes");
        assert_eq!(human_readable(1), "1 byte");
        assert_eq!(human_readable(2), "2 bytes");
        assert_eq!(human_readable(500), "500 bytes");
        assert_eq!(human_readable(1023), "1023 bytes");
        assert_eq!(human_readable(1024), "1.00 KB");
        assert_eq!(human_readable(1536), "1.50 KB");
        assert_eq!(human_readable(1048576), "1.00 MB");
        assert_eq!(human_readable(2621440), "2.50 MB");
        assert_eq!(human_readable(1073741824), "1.00 GB");
        assert_eq!(human_readable(2684354560), "2.50 GB");
    }

    #[test]
    fn test_human_readable_rounds_half_up() {
        // 1152 / 1024 = 1.125 exactly
        assert_eq!(human_readable(1152), "1.13 KB");
        // 1029 / 1024 = 1.0048...
        assert_eq!(human_readable(1029), "1.00 KB");
        assert_eq!(human_readable(MB - 1), "1024.00 KB");
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = TempDir::new().unwrap();
        let result = scan(&dir.path().join("does-not-exist"));

        assert_eq!(result.info.total_size_bytes, 0);
        assert!(result.info.subdirectory_sizes.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_scan_file_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("hello.php");
        fs::write(&file, "<?php").unwrap();

        let result = scan(&file);
        assert_eq!(result.info.total_size_bytes, 0);
    }

    #[test]
    fn test_scan_buckets_by_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("assets/js")).unwrap();
        fs::create_dir_all(root.join("includes")).unwrap();
        fs::write(root.join("plugin.php"), vec![b'a'; 100]).unwrap();
        fs::write(root.join("readme.txt"), vec![b'a'; 20]).unwrap();
        fs::write(root.join("assets/js/app.js"), vec![b'a'; 3000]).unwrap();
        fs::write(root.join("includes/class.php"), vec![b'a'; 500]).unwrap();

        let result = scan(root);
        let info = &result.info;

        assert_eq!(info.total_size_bytes, 3620);
        assert_eq!(info.human_readable, "3.54 KB");
        assert_eq!(
            info.subdirectory_sizes,
            vec![
                SubdirectorySize { path: "assets/js".to_string(), size_bytes: 3000 },
                SubdirectorySize { path: "includes".to_string(), size_bytes: 500 },
                SubdirectorySize { path: ROOT_KEY.to_string(), size_bytes: 120 },
            ]
        );
        let sum: u64 = info.subdirectory_sizes.iter().map(|s| s.size_bytes).sum();
        assert_eq!(sum, info.total_size_bytes);
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();

        let result = scan(dir.path());
        assert_eq!(result.info.total_size_bytes, 0);
        assert!(result.info.subdirectory_sizes.is_empty());
        assert_eq!(result.info.human_readable, "0 bytes");
    }

    #[test]
    fn test_scan_is_stable_across_calls() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for name in ["b", "a", "c"] {
            fs::create_dir(root.join(name)).unwrap();
            fs::write(root.join(name).join("f"), vec![0u8; 64]).unwrap();
        }

        let first = scan(root);
        let second = scan(root);

        assert_eq!(first, second);
        let order: Vec<_> = first
            .info
            .subdirectory_sizes
            .iter()
            .map(|s| s.path.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tally_keeps_partial_totals_on_error() {
        let root = Path::new("/plugins/demo");
        let entries = vec![
            Ok((root.join("demo.php"), 10)),
            Err(ScanError::Walk {
                path: root.join("locked"),
                message: "Permission denied".to_string(),
            }),
            Ok((root.join("lib/x.php"), 30)),
        ];

        let result = tally(root, entries);

        assert!(result.is_partial());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].path(), root.join("locked"));
        assert_eq!(result.info.total_size_bytes, 40);
        let sum: u64 = result.info.subdirectory_sizes.iter().map(|s| s.size_bytes).sum();
        assert_eq!(sum, 40);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_file_links_and_reports_broken_ones() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("real.php"), vec![0u8; 100]).unwrap();
        symlink(root.join("real.php"), root.join("link.php")).unwrap();
        symlink(root.join("missing.php"), root.join("broken.php")).unwrap();

        let result = scan(root);

        assert_eq!(result.info.total_size_bytes, 200);
        assert!(result.is_partial());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].path(), root.join("broken.php"));
        assert!(matches!(result.diagnostics[0], ScanError::Metadata { .. }));
        let sum: u64 = result.info.subdirectory_sizes.iter().map(|s| s.size_bytes).sum();
        assert_eq!(sum, 200);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_does_not_descend_into_directory_links() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("lib/a.php"), vec![0u8; 10]).unwrap();
        symlink(root.join("lib"), root.join("lib-link")).unwrap();
        symlink(root, root.join("lib/loop")).unwrap();

        let result = scan(root);

        assert_eq!(result.info.total_size_bytes, 10);
        assert!(!result.is_partial());
    }

    #[test]
    fn test_directory_key() {
        let root = Path::new("/p");
        assert_eq!(directory_key(root, Path::new("/p/a.php")), "/");
        assert_eq!(directory_key(root, Path::new("/p/x/y/z.php")), "x/y");
    }
}
