//! Update status resolution.
//!
//! An [`UpdateSource`] fetches a snapshot of pending updates for the whole
//! installed set in one call; the [`UpdateResolver`] then answers per-plugin
//! lookups from that snapshot, so a report makes one remote check rather
//! than one per plugin.

mod wporg;

pub use wporg::{parse_update_response, WordPressOrgSource, UPDATE_CHECK_URL};

use crate::model::{Plugin, UpdateInfo};
use crate::registry::PluginRegistry;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A pending update advertised by the remote source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteUpdate {
    /// Advertised version; empty when the source did not provide one.
    pub new_version: String,
}

impl RemoteUpdate {
    pub fn new(new_version: impl Into<String>) -> Self {
        Self {
            new_version: new_version.into(),
        }
    }
}

/// Point-in-time record of which plugins have an update pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSnapshot {
    pending: HashMap<String, RemoteUpdate>,
}

impl UpdateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, plugin_id: impl Into<String>, update: RemoteUpdate) {
        self.pending.insert(plugin_id.into(), update);
    }

    pub fn get(&self, plugin_id: &str) -> Option<&RemoteUpdate> {
        self.pending.get(plugin_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl FromIterator<(String, RemoteUpdate)> for UpdateSnapshot {
    fn from_iter<T: IntoIterator<Item = (String, RemoteUpdate)>>(iter: T) -> Self {
        Self {
            pending: iter.into_iter().collect(),
        }
    }
}

/// Remote source of update metadata.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetches a fresh snapshot for the given installed set.
    async fn fetch(&self, installed: &[Plugin], active: &HashSet<String>) -> Result<UpdateSnapshot>;
}

/// Source that never reports pending updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSource;

#[async_trait]
impl UpdateSource for OfflineSource {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn fetch(&self, _installed: &[Plugin], _active: &HashSet<String>) -> Result<UpdateSnapshot> {
        Ok(UpdateSnapshot::new())
    }
}

/// Resolves [`UpdateInfo`] for individual plugins against one snapshot.
///
/// Lookups between two [`refresh`](Self::refresh) calls all read the same
/// snapshot. Before the first refresh the snapshot is empty.
pub struct UpdateResolver<'a> {
    source: &'a dyn UpdateSource,
    registry: &'a dyn PluginRegistry,
    snapshot: UpdateSnapshot,
}

impl<'a> UpdateResolver<'a> {
    pub fn new(source: &'a dyn UpdateSource, registry: &'a dyn PluginRegistry) -> Self {
        Self {
            source,
            registry,
            snapshot: UpdateSnapshot::new(),
        }
    }

    /// Re-fetches the snapshot for the registry's current installed set.
    pub async fn refresh(&mut self) -> Result<()> {
        let installed = self.registry.list_installed_items().await?;
        let active = self.registry.list_active_ids().await?;
        self.refresh_with(&installed, &active).await
    }

    /// Re-fetches the snapshot for an installed set the caller already holds.
    ///
    /// On failure the snapshot is left empty, so every lookup reports
    /// "no update" rather than stale data.
    pub async fn refresh_with(&mut self, installed: &[Plugin], active: &HashSet<String>) -> Result<()> {
        match self.source.fetch(installed, active).await {
            Ok(snapshot) => {
                debug!(
                    source = self.source.name(),
                    pending = snapshot.len(),
                    "update snapshot refreshed"
                );
                self.snapshot = snapshot;
                Ok(())
            }
            Err(e) => {
                warn!(source = self.source.name(), "update check failed: {:#}", e);
                self.snapshot = UpdateSnapshot::new();
                Err(e)
            }
        }
    }

    pub fn snapshot(&self) -> &UpdateSnapshot {
        &self.snapshot
    }

    /// Resolves the update state of one plugin.
    ///
    /// The current version is the one the plugin declares on disk, not the
    /// one the remote source knows about.
    pub async fn lookup(&self, plugin_id: &str) -> UpdateInfo {
        let current = self
            .registry
            .get_declared_version(plugin_id)
            .await
            .unwrap_or_default();

        match self.snapshot.get(plugin_id) {
            Some(update) => UpdateInfo::pending(current, update.new_version.clone()),
            None => UpdateInfo::up_to_date(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRegistry;

    #[async_trait]
    impl PluginRegistry for FixedRegistry {
        async fn list_installed_items(&self) -> Result<Vec<Plugin>> {
            Ok(vec![
                Plugin::new("a/a.php", "A", "1.0"),
                Plugin::new("b/b.php", "B", "2.0"),
            ])
        }

        async fn list_active_ids(&self) -> Result<HashSet<String>> {
            Ok(HashSet::new())
        }

        async fn get_declared_version(&self, id: &str) -> Option<String> {
            match id {
                "a/a.php" => Some("1.0".to_string()),
                "b/b.php" => Some("2.0".to_string()),
                _ => None,
            }
        }

        fn resolve_install_directory(&self, id: &str) -> PathBuf {
            PathBuf::from(id)
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl UpdateSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, _installed: &[Plugin], _active: &HashSet<String>) -> Result<UpdateSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("network unreachable"));
            }
            Ok([
                ("a/a.php".to_string(), RemoteUpdate::new("1.1")),
                ("gone/gone.php".to_string(), RemoteUpdate::new("")),
            ]
            .into_iter()
            .collect())
        }
    }

    #[tokio::test]
    async fn test_lookup_pending_and_up_to_date() {
        let source = CountingSource::new(false);
        let mut resolver = UpdateResolver::new(&source, &FixedRegistry);
        resolver.refresh().await.unwrap();

        assert_eq!(resolver.lookup("a/a.php").await, UpdateInfo::pending("1.0", "1.1"));
        assert_eq!(resolver.lookup("b/b.php").await, UpdateInfo::up_to_date("2.0"));
    }

    #[tokio::test]
    async fn test_missing_declared_version_is_empty() {
        let source = CountingSource::new(false);
        let mut resolver = UpdateResolver::new(&source, &FixedRegistry);
        resolver.refresh().await.unwrap();

        let info = resolver.lookup("gone/gone.php").await;
        assert!(info.update_available);
        assert_eq!(info.current_version, "");
        assert_eq!(info.latest_version, "");
    }

    #[tokio::test]
    async fn test_lookups_share_one_snapshot() {
        let source = CountingSource::new(false);
        let mut resolver = UpdateResolver::new(&source, &FixedRegistry);
        resolver.refresh().await.unwrap();

        for _ in 0..5 {
            resolver.lookup("a/a.php").await;
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_snapshot() {
        let source = CountingSource::new(true);
        let mut resolver = UpdateResolver::new(&source, &FixedRegistry);

        assert!(resolver.refresh().await.is_err());
        assert!(resolver.snapshot().is_empty());
        assert_eq!(resolver.lookup("a/a.php").await, UpdateInfo::up_to_date("1.0"));
    }

    #[tokio::test]
    async fn test_offline_source() {
        let mut resolver = UpdateResolver::new(&OfflineSource, &FixedRegistry);
        resolver.refresh().await.unwrap();
        assert!(!resolver.lookup("b/b.php").await.update_available);
    }
}
