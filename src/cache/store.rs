//! [`PersistentCache`]: the two tiers behind one interface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::disk::{DiskTier, EntryRecord};
use super::memory::MemoryTier;
use super::{CacheConfig, CacheStats, THUMBNAIL_PREFIX};
use crate::telemetry;
use crate::{NetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexEntry {
    expires_at: DateTime<Utc>,
    size_bytes: u64,
}

impl IndexEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Two-tier key/value cache with per-entry expiration.
///
/// Values are stored as JSON; thumbnails and raw response bodies as bytes.
/// Share it through an `Arc`; every method takes `&self`.
///
/// The expiration index is the single point of serialization: every
/// mutation (store commit, remove, sweep, clear) runs under its lock, and
/// the commit itself has no await points, so a cancelled `store` either
/// lands completely or not at all.
pub struct PersistentCache {
    memory: MemoryTier,
    disk: DiskTier,
    index: Mutex<HashMap<String, IndexEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    config: CacheConfig,
}

impl PersistentCache {
    /// Open the cache, creating `<root>/<namespace>/metadata` on first use
    /// and loading the expiration index from disk.
    ///
    /// Records that already expired are purged during load.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        let dir = config.directory();
        let disk = DiskTier::open(dir.clone()).await.map_err(|e| {
            NetError::Io(format!("failed to create cache dir {}: {e}", dir.display()))
        })?;

        let now = Utc::now();
        let mut index = HashMap::new();
        let mut expired = 0usize;
        for record in disk.load_records().await? {
            let entry = IndexEntry {
                expires_at: record.expires_at,
                size_bytes: record.size_bytes,
            };
            if entry.is_expired(now) {
                if let Err(e) = disk.remove(&record.key) {
                    warn!(key = %record.key, error = %e, "failed to purge expired entry");
                }
                expired += 1;
            } else {
                index.insert(record.key, entry);
            }
        }
        info!(
            dir = %dir.display(),
            entries = index.len(),
            expired,
            "opened persistent cache"
        );

        Ok(Self {
            memory: MemoryTier::new(config.memory_budget_bytes),
            disk,
            index: Mutex::new(index),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            config,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ========================================================================
    // Typed values
    // ========================================================================

    /// Serialize `value` as JSON and store it under `key` for `ttl`.
    ///
    /// Returns whether the entry was written. Failures are logged, never
    /// returned.
    pub async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.store_raw(key, Bytes::from(bytes), ttl).await,
            Err(e) => {
                warn!(key, error = %e, "skipping cache write: value failed to serialize");
                false
            }
        }
    }

    /// Look up and deserialize the value under `key`.
    ///
    /// A payload that no longer matches `T` is reported as absent.
    pub async fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.retrieve_raw(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached payload failed to decode");
                None
            }
        }
    }

    // ========================================================================
    // Thumbnails
    // ========================================================================

    /// Store binary thumbnail data under its own keyspace.
    pub async fn store_thumbnail(&self, key: &str, data: Bytes, ttl: Duration) -> bool {
        self.store_raw(&thumbnail_key(key), data, ttl).await
    }

    pub async fn retrieve_thumbnail(&self, key: &str) -> Option<Bytes> {
        self.retrieve_raw(&thumbnail_key(key)).await
    }

    pub async fn remove_thumbnail(&self, key: &str) {
        self.remove(&thumbnail_key(key)).await;
    }

    // ========================================================================
    // Raw bytes
    // ========================================================================

    /// Store raw bytes under `key` for `ttl`, replacing any previous entry.
    pub async fn store_raw(&self, key: &str, payload: Bytes, ttl: Duration) -> bool {
        let record = EntryRecord {
            key: key.to_string(),
            expires_at: expiry_after(ttl),
            size_bytes: payload.len() as u64,
        };

        let staged = match self.disk.stage(&record, &payload).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!(key, error = %e, "skipping cache write: disk stage failed");
                return false;
            }
        };

        let mut index = self.index.lock().await;
        // Commit section: no await points until the lock is released.
        if let Err(e) = staged.commit() {
            // The payload may already be replaced; drop the whole entry.
            warn!(key, error = %e, "skipping cache write: disk commit failed");
            index.remove(key);
            self.memory.invalidate(key);
            let _ = self.disk.remove(key);
            return false;
        }
        index.insert(
            record.key,
            IndexEntry {
                expires_at: record.expires_at,
                size_bytes: record.size_bytes,
            },
        );
        self.memory.insert(key, payload);
        drop(index);

        debug!(key, size = record.size_bytes, "cache store");
        true
    }

    /// Look up raw bytes under `key`.
    ///
    /// Expired entries are purged and reported as a miss. A disk hit
    /// repopulates the memory tier.
    pub async fn retrieve_raw(&self, key: &str) -> Option<Bytes> {
        let now = Utc::now();
        let entry = self.index.lock().await.get(key).copied();

        let Some(entry) = entry else {
            self.record_miss();
            return None;
        };

        if entry.is_expired(now) {
            debug!(key, "cache entry expired");
            self.purge_if(key, entry).await;
            metrics::counter!(telemetry::CACHE_EXPIRED_TOTAL).increment(1);
            self.record_miss();
            return None;
        }

        if let Some(bytes) = self.memory.get(key) {
            self.record_hit("memory");
            return Some(bytes);
        }

        match self.disk.read(key).await {
            Ok(Some(bytes)) => {
                let index = self.index.lock().await;
                // Only repopulate if the entry was not replaced or removed
                // while the file was being read.
                let unchanged = index
                    .get(key)
                    .is_some_and(|current| current.expires_at == entry.expires_at);
                if unchanged {
                    self.memory.insert(key, bytes.clone());
                }
                drop(index);
                self.record_hit("disk");
                Some(bytes)
            }
            Ok(None) => {
                warn!(key, "cache index pointed at a missing payload");
                self.purge_if(key, entry).await;
                self.record_miss();
                None
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                self.record_miss();
                None
            }
        }
    }

    // ========================================================================
    // Removal and maintenance
    // ========================================================================

    /// Remove `key` from both tiers. Idempotent.
    pub async fn remove(&self, key: &str) {
        self.purge(key).await;
    }

    /// Empty both tiers and the index, then recreate the directory layout.
    pub async fn clear_all(&self) {
        let mut index = self.index.lock().await;
        index.clear();
        self.memory.clear();
        if let Err(e) = self.disk.reset().await {
            warn!(dir = %self.disk.dir().display(), error = %e, "failed to reset cache dir");
        }
        drop(index);
        info!("cache cleared");
    }

    /// Purge every expired entry. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut index = self.index.lock().await;
        let expired: Vec<String> = index
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            index.remove(key);
            self.memory.invalidate(key);
            if let Err(e) = self.disk.remove(key) {
                warn!(key, error = %e, "failed to delete expired cache files");
            }
        }
        drop(index);

        if !expired.is_empty() {
            metrics::counter!(telemetry::CACHE_EXPIRED_TOTAL).increment(expired.len() as u64);
            debug!(count = expired.len(), "swept expired cache entries");
        }
        expired.len()
    }

    /// Spawn the periodic expiration sweep at `config.sweep_interval`.
    ///
    /// The task holds only a weak reference and stops by itself once the
    /// cache is dropped.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let period = self.config.sweep_interval;
        let cache: Weak<Self> = Arc::downgrade(self);
        let (tx, mut rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        let Some(cache) = cache.upgrade() else { break };
                        cache.sweep_expired().await;
                    }
                }
            }
            debug!("cache sweeper stopped");
        });

        SweeperHandle {
            shutdown: Some(tx),
            task,
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub async fn stats(&self) -> CacheStats {
        let (entry_count, total_size_bytes) = {
            let index = self.index.lock().await;
            (index.len(), index.values().map(|e| e.size_bytes).sum())
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            hits,
            misses,
            hit_rate: ratio(hits, misses),
            entry_count,
            total_size_bytes,
        }
    }

    /// `hits / (hits + misses)`, 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        ratio(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Bytes currently used on disk, measured by walking the directory.
    pub async fn disk_usage(&self) -> u64 {
        match self.disk.usage().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to measure cache dir");
                0
            }
        }
    }

    async fn purge(&self, key: &str) {
        let mut index = self.index.lock().await;
        index.remove(key);
        self.memory.invalidate(key);
        if let Err(e) = self.disk.remove(key) {
            warn!(key, error = %e, "failed to delete cache files");
        }
    }

    /// Purge `key` only if its index entry is still `seen`. A store that
    /// committed since the entry was read keeps its value.
    async fn purge_if(&self, key: &str, seen: IndexEntry) -> bool {
        let mut index = self.index.lock().await;
        if index.get(key) != Some(&seen) {
            return false;
        }
        index.remove(key);
        self.memory.invalidate(key);
        if let Err(e) = self.disk.remove(key) {
            warn!(key, error = %e, "failed to delete cache files");
        }
        true
    }

    fn record_hit(&self, tier: &'static str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
    }
}

impl std::fmt::Debug for PersistentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCache")
            .field("dir", &self.disk.dir())
            .finish_non_exhaustive()
    }
}

/// Handle to the background sweep task. Dropping it stops the sweep.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep and wait for the task to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn thumbnail_key(key: &str) -> String {
    format!("{THUMBNAIL_PREFIX}{key}")
}

fn expiry_after(ttl: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
