//! TTL cache for computed plugin sizes.
//!
//! Walking a plugin directory is the expensive part of a report, so its
//! result is kept behind the [`SizeCache`] trait. Every entry carries its
//! own expiry; an expired entry reads exactly like a missing one.
//!
//! Two backends are provided:
//! - [`FileCache`] - JSON files in the platform cache directory (default)
//! - [`MemoryCache`] - a process-local map
//!
//! # Cache Location
//!
//! [`FileCache::new`] stores entries in:
//! - Linux: `~/.cache/plugin-reporter/`
//! - macOS: `~/Library/Caches/plugin-reporter/`
//! - Windows: `%LOCALAPPDATA%\plugin-reporter\`
//!
//! Each entry file is named `plugin_reporter_size_<plugin id>.json`.
//! [`Invalidation::All`] only removes files with that prefix.
//!
//! # Example
//!
//! ```
//! use plugin_reporter::cache::{Invalidation, MemoryCache, SizeCache, SizeCacheKey, DEFAULT_TTL};
//! use plugin_reporter::SizeInfo;
//!
//! let cache = MemoryCache::new();
//! let key = SizeCacheKey::new("akismet/akismet.php");
//!
//! cache.put(&key, &SizeInfo::empty(), DEFAULT_TTL).unwrap();
//! assert!(cache.get(&key).is_some());
//!
//! cache.invalidate(&Invalidation::All).unwrap();
//! assert!(cache.get(&key).is_none());
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::SizeInfo;
use crate::platform::cache_dir;

/// Namespace shared by every size entry this crate stores.
pub const KEY_PREFIX: &str = "plugin_reporter_size_";

/// Default entry lifetime: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// Typed cache key for one plugin's size entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SizeCacheKey(String);

impl SizeCacheKey {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self(plugin_id.into())
    }

    pub fn plugin_id(&self) -> &str {
        &self.0
    }

    /// Namespaced storage name, safe to use as a file stem.
    pub fn storage_key(&self) -> String {
        let safe_id: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", KEY_PREFIX, safe_id)
    }
}

/// What to drop from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// A single plugin's entry. Missing entries are not an error.
    One(SizeCacheKey),
    /// Every entry in this crate's namespace.
    All,
}

/// Storage for computed [`SizeInfo`] values.
///
/// Writers race last-write-wins; entries are pure functions of the
/// directory contents, so a concurrent overwrite is never wrong.
pub trait SizeCache: Send + Sync {
    /// Returns the live entry for `key`, or `None` when missing or expired.
    fn get(&self, key: &SizeCacheKey) -> Option<SizeInfo>;

    /// Stores `info`, replacing any previous entry and restarting its TTL.
    fn put(&self, key: &SizeCacheKey, info: &SizeInfo, ttl: Duration) -> Result<()>;

    /// Drops one entry or the whole namespace.
    fn invalidate(&self, scope: &Invalidation) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    plugin_id: String,
    stored_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    size: SizeInfo,
}

impl CacheEntry {
    fn new(key: &SizeCacheKey, size: &SizeInfo, ttl: Duration) -> Self {
        let stored_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| stored_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            plugin_id: key.plugin_id().to_string(),
            stored_at,
            expires_at,
            size: size.clone(),
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A file-based size cache.
///
/// Values are stored as JSON files in the cache directory, one per plugin.
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Creates a cache in the platform cache directory.
    pub fn new() -> Self {
        Self { dir: cache_dir() }
    }

    /// Creates a cache rooted at `dir`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Ensures the cache directory exists.
    fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn entry_path(&self, key: &SizeCacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.storage_key()))
    }
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SizeCache for FileCache {
    fn get(&self, key: &SizeCacheKey) -> Option<SizeInfo> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(plugin = key.plugin_id(), "discarding unreadable size entry: {}", e);
                return None;
            }
        };

        // Sanitised names can collide; never hand out another plugin's entry.
        if entry.plugin_id != key.plugin_id() {
            return None;
        }

        if !entry.is_live(Utc::now()) {
            debug!(plugin = key.plugin_id(), "size entry expired");
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(file = %path.display(), "failed to remove expired size entry: {}", e);
                }
            }
            return None;
        }

        debug!(plugin = key.plugin_id(), "size cache hit");
        Some(entry.size)
    }

    fn put(&self, key: &SizeCacheKey, info: &SizeInfo, ttl: Duration) -> Result<()> {
        self.ensure_dir()?;
        let content = serde_json::to_string(&CacheEntry::new(key, info, ttl))?;
        fs::write(self.entry_path(key), content)?;
        Ok(())
    }

    fn invalidate(&self, scope: &Invalidation) -> Result<()> {
        match scope {
            Invalidation::One(key) => match fs::remove_file(self.entry_path(key)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            Invalidation::All => {
                if !self.dir.exists() {
                    return Ok(());
                }
                let mut failed = 0usize;
                for entry in fs::read_dir(&self.dir)? {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(e) => {
                            warn!(dir = %self.dir.display(), "failed to read cache entry: {}", e);
                            failed += 1;
                            continue;
                        }
                    };
                    let name = entry.file_name();
                    let name = name.to_string_lossy();
                    if !(name.starts_with(KEY_PREFIX) && name.ends_with(".json")) {
                        continue;
                    }
                    match fs::remove_file(entry.path()) {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => {
                            warn!(file = %entry.path().display(), "failed to remove size entry: {}", e);
                            failed += 1;
                        }
                    }
                }
                if failed > 0 {
                    anyhow::bail!(
                        "Failed to clear {} cache entr{} in {}",
                        failed,
                        if failed == 1 { "y" } else { "ies" },
                        self.dir.display()
                    );
                }
                Ok(())
            }
        }
    }
}

/// An in-process size cache with the same TTL semantics as [`FileCache`].
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<SizeCacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SizeCacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SizeCache for MemoryCache {
    fn get(&self, key: &SizeCacheKey) -> Option<SizeInfo> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(Utc::now()) => Some(entry.size.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &SizeCacheKey, info: &SizeInfo, ttl: Duration) -> Result<()> {
        self.lock()
            .insert(key.clone(), CacheEntry::new(key, info, ttl));
        Ok(())
    }

    fn invalidate(&self, scope: &Invalidation) -> Result<()> {
        let mut entries = self.lock();
        match scope {
            Invalidation::One(key) => {
                entries.remove(key);
            }
            Invalidation::All => entries.clear(),
        }
        Ok(())
    }
}
