//! Cross-platform path resolution.
//!
//! This module finds the directories plugin-reporter reads from and
//! writes to: the WordPress install it reports on, and its own cache.

use std::path::{Path, PathBuf};

/// Application directory name used under the platform config/cache dirs.
pub const APP_DIR: &str = "plugin-reporter";

/// Returns the cache directory for plugin-reporter.
///
/// Platform-specific locations:
/// - Linux: `~/.cache/plugin-reporter/`
/// - macOS: `~/Library/Caches/plugin-reporter/`
/// - Windows: `%LOCALAPPDATA%\plugin-reporter\`
///
/// Falls back to `/tmp/plugin-reporter/` if no cache directory can be determined.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
}

/// Returns true if `path` looks like a WordPress root.
pub fn is_wordpress_root(path: &Path) -> bool {
    path.join("wp-content").is_dir()
        && (path.join("wp-config.php").is_file() || path.join("wp-load.php").is_file())
}

/// Finds the WordPress root containing `start`, walking up its ancestors.
///
/// Returns `None` if no ancestor looks like a WordPress install.
pub fn find_wordpress_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_wordpress_root(candidate))
        .map(Path::to_path_buf)
}

/// Returns the plugins directory for a WordPress root.
///
/// Location: `<root>/wp-content/plugins/`.
pub fn plugins_dir(wp_root: &Path) -> PathBuf {
    wp_root.join("wp-content").join("plugins")
}

/// Returns the invoking user name, as reported by the environment.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
