//! Configuration file handling.
//!
//! This module provides loading and saving of plugin-reporter configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/plugin-reporter/config.toml`
//! - macOS: `~/Library/Application Support/plugin-reporter/config.toml`
//! - Windows: `%APPDATA%\plugin-reporter\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! wp_root = "/var/www/html"
//! size_cache_ttl_hours = 24
//! default_format = "table"
//! check_updates = true
//! include_size = true
//! scan_concurrency = 4
//! active_plugins = ["akismet/akismet.php"]
//!
//! [export]
//! secret = "3f1c..."
//! administrators = ["www-admin"]
//! ```

use anyhow::Result;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::platform::APP_DIR;
use crate::registry::ActiveSource;

/// Application configuration.
///
/// It can be loaded from a TOML file or created with default values.
///
/// # Example
///
/// ```no_run
/// use plugin_reporter::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Size cache TTL: {} hours", config.size_cache_ttl_hours);
/// println!("Check updates: {}", config.check_updates);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WordPress installation root.
    ///
    /// Default: unset (the current directory or its nearest WordPress ancestor)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wp_root: Option<PathBuf>,

    /// Plugins directory, when it is not `<wp_root>/wp-content/plugins`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<PathBuf>,

    /// How long computed plugin sizes stay cached, in hours.
    ///
    /// Default: 24 hours
    pub size_cache_ttl_hours: u64,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json", "csv"
    /// Default: "table"
    pub default_format: String,

    /// Whether reports check for plugin updates by default.
    ///
    /// Default: true
    pub check_updates: bool,

    /// Whether reports include on-disk sizes by default.
    ///
    /// Default: true
    pub include_size: bool,

    /// Active plugin ids. When unset, they are read with WP-CLI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_plugins: Option<Vec<String>>,

    /// Maximum number of plugin directories scanned at once.
    ///
    /// Default: 4
    pub scan_concurrency: usize,

    /// Export authorization settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Settings for the guarded `export` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Key export tokens are derived from. Empty disables exports.
    pub secret: String,

    /// Users allowed to export. `"*"` admits everyone.
    pub administrators: Vec<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            administrators: vec!["*".to_string()],
        }
    }
}

impl ExportConfig {
    /// Generates a secret if none is set. Returns whether one was generated.
    pub fn ensure_secret(&mut self) -> bool {
        if !self.secret.is_empty() {
            return false;
        }
        self.secret = generate_secret();
        true
    }
}

fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wp_root: None,
            plugins_dir: None,
            size_cache_ttl_hours: 24,
            default_format: "table".to_string(),
            check_updates: true,
            include_size: true,
            active_plugins: None,
            scan_concurrency: 4,
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use plugin_reporter::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("plugin-reporter/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn size_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.size_cache_ttl_hours.saturating_mul(3600))
    }

    /// Where the active plugin set comes from.
    pub fn active_source(&self) -> ActiveSource {
        match &self.active_plugins {
            Some(ids) => ActiveSource::Static(ids.clone()),
            None => ActiveSource::WpCli,
        }
    }

    /// Generates a string containing the default configuration.
    ///
    /// This is useful for showing users what the default config looks like.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
