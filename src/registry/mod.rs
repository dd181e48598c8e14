//! Installed-plugin registry.
//!
//! This module provides the [`PluginRegistry`] trait, the narrow interface
//! the aggregator uses to learn which plugins exist, which are active, and
//! where they live on disk, plus [`WpContentRegistry`], which answers those
//! questions from a WordPress install.
//!
//! # Example
//!
//! ```no_run
//! use plugin_reporter::registry::{ActiveSource, PluginRegistry, WpContentRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = WpContentRegistry::new("/var/www/html", ActiveSource::WpCli);
//!
//!     for plugin in registry.list_installed_items().await? {
//!         println!("{}: {}", plugin.name, plugin.version);
//!     }
//!     Ok(())
//! }
//! ```

mod headers;
mod wordpress;
mod wp_cli;

pub use headers::{parse_headers, PluginHeaders};
pub use wordpress::WpContentRegistry;
pub use wp_cli::parse_active_plugins;

use crate::model::Plugin;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;

/// Source of plugin identity, activation and location.
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    /// Returns every installed plugin, in registry order. Ids are unique.
    async fn list_installed_items(&self) -> Result<Vec<Plugin>>;

    /// Returns the ids of the currently active plugins.
    async fn list_active_ids(&self) -> Result<HashSet<String>>;

    /// Re-reads the version a plugin declares. `None` when it cannot be read.
    async fn get_declared_version(&self, id: &str) -> Option<String>;

    /// Returns the directory whose contents make up the plugin.
    fn resolve_install_directory(&self, id: &str) -> PathBuf;
}

/// Where the active plugin list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveSource {
    /// A fixed list of active plugin ids.
    Static(Vec<String>),
    /// The `active_plugins` option, read through WP-CLI.
    WpCli,
}
