use super::headers::PluginHeaders;
use super::wp_cli::read_active_plugins;
use super::{ActiveSource, PluginRegistry};
use crate::model::Plugin;
use crate::platform::plugins_dir;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Registry backed by a WordPress install's `wp-content/plugins` directory.
///
/// Plugins are `.php` files at the top of the plugins directory or one
/// directory below it that declare a `Plugin Name` header. Their id is the
/// file path relative to the plugins directory, e.g. `akismet/akismet.php`.
pub struct WpContentRegistry {
    wp_root: PathBuf,
    plugins_dir: PathBuf,
    active: ActiveSource,
}

impl WpContentRegistry {
    pub fn new(wp_root: impl Into<PathBuf>, active: ActiveSource) -> Self {
        let wp_root = wp_root.into();
        Self {
            plugins_dir: plugins_dir(&wp_root),
            wp_root,
            active,
        }
    }

    /// Overrides the plugins directory (`WP_PLUGIN_DIR`).
    pub fn with_plugins_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugins_dir = dir.into();
        self
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    fn plugin_file(&self, id: &str) -> PathBuf {
        id.split('/')
            .fold(self.plugins_dir.clone(), |path, part| path.join(part))
    }

    /// Collects candidate plugin files as `(id, path)` pairs.
    fn candidate_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let entries = fs::read_dir(&self.plugins_dir).with_context(|| {
            format!("Failed to read plugins directory: {:?}", self.plugins_dir)
        })?;

        let mut candidates = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            if path.is_dir() {
                let Ok(sub_entries) = fs::read_dir(&path) else {
                    continue;
                };
                for sub in sub_entries.flatten() {
                    let sub_name = sub.file_name().to_string_lossy().to_string();
                    if !sub_name.starts_with('.') && is_php_file(&sub.path()) {
                        candidates.push((format!("{}/{}", name, sub_name), sub.path()));
                    }
                }
            } else if is_php_file(&path) {
                candidates.push((name, path));
            }
        }

        Ok(candidates)
    }
}

fn is_php_file(path: &Path) -> bool {
    path.is_file() && path.extension().map(|e| e == "php").unwrap_or(false)
}

#[async_trait]
impl PluginRegistry for WpContentRegistry {
    async fn list_installed_items(&self) -> Result<Vec<Plugin>> {
        if !self.plugins_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut plugins = Vec::new();

        for (id, path) in self.candidate_files()? {
            let headers = match PluginHeaders::read(&path) {
                Ok(h) => h,
                Err(e) => {
                    debug!(file = %path.display(), "skipping unreadable plugin file: {}", e);
                    continue;
                }
            };
            if !headers.is_plugin() {
                continue;
            }

            let mut plugin = Plugin::new(id, headers.name, headers.version)
                .with_description(headers.description)
                .with_author(headers.author);
            if !headers.plugin_uri.is_empty() {
                plugin = plugin.with_uri(headers.plugin_uri);
            }
            plugins.push(plugin);
        }

        // Same ordering as the plugins screen: by name, case-insensitive.
        plugins.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(plugins)
    }

    async fn list_active_ids(&self) -> Result<HashSet<String>> {
        let ids = match &self.active {
            ActiveSource::Static(ids) => ids.clone(),
            ActiveSource::WpCli => read_active_plugins(&self.wp_root)?,
        };
        Ok(ids.into_iter().collect())
    }

    async fn get_declared_version(&self, id: &str) -> Option<String> {
        let headers = PluginHeaders::read(&self.plugin_file(id)).ok()?;
        if headers.version.is_empty() {
            None
        } else {
            Some(headers.version)
        }
    }

    fn resolve_install_directory(&self, id: &str) -> PathBuf {
        match id.rsplit_once('/') {
            Some((dir, _)) => self.plugin_file(dir),
            // Single-file plugins have no directory of their own.
            None => self.plugin_file(id),
        }
    }
}
