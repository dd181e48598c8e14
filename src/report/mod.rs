//! Report aggregation.
//!
//! The [`Aggregator`] walks the registry once and merges, per plugin,
//! activation state, update status (one remote refresh per build) and
//! on-disk size (from the [`SizeCache`], scanning on a miss) into a
//! [`ReportRecord`]. Records keep registry order; presentation ordering and
//! filtering live in [`view`].

pub mod view;

pub use view::{SortKey, SortOrder, StatusFilter};

use crate::cache::{SizeCache, SizeCacheKey, DEFAULT_TTL};
use crate::model::{Diagnostic, Plugin, Report, ReportRecord, SizeInfo};
use crate::registry::PluginRegistry;
use crate::size::{self, SizeScan};
use crate::update::{UpdateResolver, UpdateSource};
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of plugin directories scanned at once.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 4;

/// Builds [`Report`]s from the injected collaborators.
pub struct Aggregator<'a> {
    registry: &'a dyn PluginRegistry,
    updates: &'a dyn UpdateSource,
    cache: &'a dyn SizeCache,
    ttl: Duration,
    scan_concurrency: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        registry: &'a dyn PluginRegistry,
        updates: &'a dyn UpdateSource,
        cache: &'a dyn SizeCache,
    ) -> Self {
        Self {
            registry,
            updates,
            cache,
            ttl: DEFAULT_TTL,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
        }
    }

    /// Sets the lifetime of size entries written by this aggregator.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets how many directories may be scanned concurrently (minimum 1).
    pub fn with_scan_concurrency(mut self, scan_concurrency: usize) -> Self {
        self.scan_concurrency = scan_concurrency.max(1);
        self
    }

    /// Builds one report over every installed plugin.
    ///
    /// With `include_update`, the update snapshot is refreshed once for the
    /// whole batch; a failed refresh is logged and every plugin reports no
    /// update. With `include_size`, sizes come from the cache or a fresh
    /// scan that is written back.
    pub async fn build(&self, include_update: bool, include_size: bool) -> Result<Report> {
        let installed = self.registry.list_installed_items().await?;
        let active = self.registry.list_active_ids().await?;
        debug!(
            installed = installed.len(),
            active = active.len(),
            "building plugin report"
        );

        let mut resolver = UpdateResolver::new(self.updates, self.registry);
        if include_update {
            // Logged by the resolver; the report still builds without updates.
            let _ = resolver.refresh_with(&installed, &active).await;
        }

        let sizes: Vec<Option<SizeScan>> = if include_size {
            self.scan_all(&installed).await.into_iter().map(Some).collect()
        } else {
            vec![None; installed.len()]
        };

        let mut records = Vec::with_capacity(installed.len());
        let mut diagnostics = Vec::new();

        for (plugin, scan) in installed.into_iter().zip(sizes) {
            let is_active = active.contains(&plugin.id);
            let mut record = ReportRecord::new(plugin, is_active);

            if include_update {
                record.update = Some(resolver.lookup(&record.plugin.id).await);
            }

            if let Some(scan) = scan {
                diagnostics.extend(scan.diagnostics.into_iter().map(|error| Diagnostic {
                    plugin_id: record.plugin.id.clone(),
                    error,
                }));
                record.size = Some(scan.info);
            }

            records.push(record);
        }

        let mut report = Report::new(records, include_update, include_size);
        report.diagnostics = diagnostics;
        Ok(report)
    }

    /// Returns the size of one plugin, from the cache when possible.
    pub async fn size_of(&self, plugin_id: &str) -> SizeInfo {
        self.cached_or_scan(plugin_id).await.info
    }

    async fn scan_all(&self, plugins: &[Plugin]) -> Vec<SizeScan> {
        stream::iter(plugins.iter().map(|p| self.cached_or_scan(&p.id)))
            .buffered(self.scan_concurrency)
            .collect()
            .await
    }

    async fn cached_or_scan(&self, plugin_id: &str) -> SizeScan {
        let key = SizeCacheKey::new(plugin_id);

        if let Some(info) = self.cache.get(&key) {
            return SizeScan {
                info,
                diagnostics: Vec::new(),
            };
        }

        let directory = self.registry.resolve_install_directory(plugin_id);
        let scan = match tokio::task::spawn_blocking(move || size::scan(&directory)).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!(plugin = plugin_id, "size scan aborted: {}", e);
                return SizeScan::default();
            }
        };

        // Partial totals are reported but not kept for the next 24 hours.
        if !scan.is_partial() {
            if let Err(e) = self.cache.put(&key, &scan.info, self.ttl) {
                warn!(plugin = plugin_id, "failed to cache plugin size: {:#}", e);
            }
        }

        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Invalidation, MemoryCache};
    use crate::update::{OfflineSource, RemoteUpdate, UpdateSnapshot};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct DirRegistry {
        root: PathBuf,
        plugins: Vec<Plugin>,
        active: Mutex<HashSet<String>>,
    }

    impl DirRegistry {
        fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                plugins: vec![
                    Plugin::new("zeta/zeta.php", "Zeta", "1.0").with_author("Z"),
                    Plugin::new("alpha/alpha.php", "Alpha", "2.0").with_uri("https://alpha.example"),
                    Plugin::new("gone/gone.php", "Gone", "0.1"),
                ],
                active: Mutex::new(["alpha/alpha.php".to_string()].into_iter().collect()),
            }
        }

        fn set_active(&self, ids: &[&str]) {
            *self.active.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        }
    }

    #[async_trait]
    impl PluginRegistry for DirRegistry {
        async fn list_installed_items(&self) -> Result<Vec<Plugin>> {
            Ok(self.plugins.clone())
        }

        async fn list_active_ids(&self) -> Result<HashSet<String>> {
            Ok(self.active.lock().unwrap().clone())
        }

        async fn get_declared_version(&self, id: &str) -> Option<String> {
            self.plugins
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.version.clone())
        }

        fn resolve_install_directory(&self, id: &str) -> PathBuf {
            let dir = id.split('/').next().unwrap_or(id);
            self.root.join(dir)
        }
    }

    struct PendingSource;

    #[async_trait]
    impl UpdateSource for PendingSource {
        fn name(&self) -> &'static str {
            "pending"
        }

        async fn fetch(&self, _installed: &[Plugin], _active: &HashSet<String>) -> Result<UpdateSnapshot> {
            Ok([("zeta/zeta.php".to_string(), RemoteUpdate::new("1.5"))]
                .into_iter()
                .collect())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl UpdateSource for BrokenSource {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn fetch(&self, _installed: &[Plugin], _active: &HashSet<String>) -> Result<UpdateSnapshot> {
            Err(anyhow!("503 Service Unavailable"))
        }
    }

    fn plugin_dirs() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("zeta/assets")).unwrap();
        fs::create_dir_all(dir.path().join("alpha")).unwrap();
        fs::write(dir.path().join("zeta/zeta.php"), vec![0u8; 1000]).unwrap();
        fs::write(dir.path().join("zeta/assets/app.js"), vec![0u8; 2000]).unwrap();
        fs::write(dir.path().join("alpha/alpha.php"), vec![0u8; 100]).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_build_without_optional_blocks() {
        let dir = plugin_dirs();
        let registry = DirRegistry::new(dir.path());
        let cache = MemoryCache::new();
        let aggregator = Aggregator::new(&registry, &PendingSource, &cache);

        let report = aggregator.build(false, false).await.unwrap();

        let ids: Vec<_> = report.records.iter().map(|r| r.plugin.id.as_str()).collect();
        assert_eq!(ids, vec!["zeta/zeta.php", "alpha/alpha.php", "gone/gone.php"]);
        assert!(report.records.iter().all(|r| !r.has_update_info() && !r.has_size_info()));
        assert!(report.records[1].is_active);
        assert!(!report.records[0].is_active);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_build_with_updates_and_sizes() {
        let dir = plugin_dirs();
        let registry = DirRegistry::new(dir.path());
        let cache = MemoryCache::new();
        let aggregator = Aggregator::new(&registry, &PendingSource, &cache);

        let report = aggregator.build(true, true).await.unwrap();
        let zeta = &report.records[0];
        let gone = &report.records[2];

        assert_eq!(zeta.update, Some(crate::model::UpdateInfo::pending("1.0", "1.5")));
        assert_eq!(zeta.size_bytes(), 3000);
        assert_eq!(zeta.size.as_ref().unwrap().subdirectory_sizes[0].path, "assets");
        assert_eq!(gone.size, Some(SizeInfo::empty()));
        assert!(!gone.update_available());

        let summary = &report.summary;
        assert_eq!(summary.total_count, 3);
        assert_eq!(summary.active_count, 1);
        assert_eq!(summary.inactive_count, 2);
        assert_eq!(summary.update_count, 1);
        assert_eq!(summary.total_size_bytes, 3100);
        assert_eq!(summary.total_size_human, "3.03 KB");
        assert_eq!(cache.len(), 3);
        assert!(report.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_sizes_come_from_cache_until_invalidated() {
        let dir = plugin_dirs();
        let registry = DirRegistry::new(dir.path());
        let cache = MemoryCache::new();
        let aggregator = Aggregator::new(&registry, &OfflineSource, &cache);

        let first = aggregator.build(false, true).await.unwrap();
        fs::write(dir.path().join("alpha/extra.txt"), vec![0u8; 900]).unwrap();

        let cached = aggregator.build(false, true).await.unwrap();
        assert_eq!(cached.records[1].size_bytes(), first.records[1].size_bytes());

        cache
            .invalidate(&Invalidation::One(SizeCacheKey::new("alpha/alpha.php")))
            .unwrap();
        let fresh = aggregator.build(false, true).await.unwrap();
        assert_eq!(fresh.records[1].size_bytes(), 1000);
        assert_eq!(fresh.records[0].size_bytes(), 3000);
    }

    #[tokio::test]
    async fn test_activation_is_never_cached() {
        let dir = plugin_dirs();
        let registry = DirRegistry::new(dir.path());
        let cache = MemoryCache::new();
        let aggregator = Aggregator::new(&registry, &OfflineSource, &cache);

        let before = aggregator.build(false, true).await.unwrap();
        registry.set_active(&["zeta/zeta.php", "gone/gone.php"]);
        let after = aggregator.build(false, true).await.unwrap();

        assert_eq!(before.summary.active_count, 1);
        assert_eq!(after.summary.active_count, 2);
        assert!(after.records[0].is_active);
        assert!(!after.records[1].is_active);
    }

    #[tokio::test]
    async fn test_failed_update_check_still_builds() {
        let dir = plugin_dirs();
        let registry = DirRegistry::new(dir.path());
        let cache = MemoryCache::new();
        let aggregator = Aggregator::new(&registry, &BrokenSource, &cache);

        let report = aggregator.build(true, false).await.unwrap();

        assert_eq!(report.summary.update_count, 0);
        assert!(report.records.iter().all(|r| r.has_update_info()));
        assert_eq!(report.records[0].update.as_ref().unwrap().latest_version, "1.0");
    }

    #[tokio::test]
    async fn test_build_is_deterministic() {
        let dir = plugin_dirs();
        let registry = DirRegistry::new(dir.path());
        let cache = MemoryCache::new();
        let aggregator = Aggregator::new(&registry, &PendingSource, &cache).with_scan_concurrency(1);

        let first = aggregator.build(true, true).await.unwrap();
        let second = aggregator.build(true, true).await.unwrap();

        assert_eq!(first.records, second.records);
        assert_eq!(first.summary, second.summary);
    }

    #[tokio::test]
    async fn test_size_of_writes_back_to_cache() {
        let dir = plugin_dirs();
        let registry = DirRegistry::new(dir.path());
        let cache = MemoryCache::new();
        let aggregator = Aggregator::new(&registry, &OfflineSource, &cache);

        let size = aggregator.size_of("alpha/alpha.php").await;

        assert_eq!(size.total_size_bytes, 100);
        assert_eq!(cache.get(&SizeCacheKey::new("alpha/alpha.php")), Some(size));
    }
}
