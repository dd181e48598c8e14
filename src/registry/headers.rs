use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Only the start of a plugin file is searched for headers.
pub const HEADER_SCAN_BYTES: u64 = 8 * 1024;

/// Header fields read from a plugin's main file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginHeaders {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub plugin_uri: String,
}

impl PluginHeaders {
    /// Reads the headers from the first [`HEADER_SCAN_BYTES`] of `path`.
    pub fn read(path: &Path) -> io::Result<Self> {
        let mut buf = Vec::new();
        File::open(path)?
            .take(HEADER_SCAN_BYTES)
            .read_to_end(&mut buf)?;
        Ok(parse_headers(&String::from_utf8_lossy(&buf)))
    }

    /// A file is a plugin only if it declares a name.
    pub fn is_plugin(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Parses `Key: value` header lines out of a plugin file's leading comment.
///
/// An opening `<?php` and comment decoration (`*`, `#`, `//`, `@`) before
/// the key are ignored. Keys match case-insensitively and the first
/// occurrence of a key wins.
pub fn parse_headers(content: &str) -> PluginHeaders {
    PluginHeaders {
        name: header_value(content, "Plugin Name"),
        version: header_value(content, "Version"),
        description: header_value(content, "Description"),
        author: header_value(content, "Author"),
        plugin_uri: header_value(content, "Plugin URI"),
    }
}

fn header_value(content: &str, key: &str) -> String {
    for line in content.lines() {
        let line = line.trim_start_matches([' ', '\t']);
        let line = line.strip_prefix("<?php").unwrap_or(line);
        let line = line.trim_start_matches([' ', '\t', '/', '*', '#', '@']);
        let Some(head) = line.get(..key.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(key) {
            continue;
        }
        if let Some(value) = line[key.len()..].strip_prefix(':') {
            return cleanup_comment(value);
        }
    }
    String::new()
}

/// Drops a trailing comment close (`*/`) or PHP close tag (`?>`) and trims.
fn cleanup_comment(value: &str) -> String {
    let end = [value.find("*/"), value.find("?>")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(value.len());
    value[..end].trim().to_string()
}
