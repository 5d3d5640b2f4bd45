//! Two-tier persistent cache.
//!
//! [`PersistentCache`] fronts a byte-bounded in-memory tier
//! ([`memory::MemoryTier`], moka) with a durable on-disk tier
//! ([`disk::DiskTier`]). Callers only see `store` / `retrieve` / `remove`;
//! the tiering stays inside this module.
//!
//! # Layout on disk
//!
//! ```text
//! <root>/<namespace>/<sha256(key)>.bin            payload
//! <root>/<namespace>/metadata/<sha256(key)>.json  { key, expires_at, size_bytes }
//! ```
//!
//! Both files are written tmp + rename. The sidecar records are loaded into
//! an in-memory expiration index at [`PersistentCache::open()`], so entries
//! survive a restart. The index is authoritative: a payload file without a
//! record is never served.
//!
//! # Failure policy
//!
//! The cache is an optimisation. Read failures degrade to a miss, write
//! failures are skipped; both are logged at `warn` and never returned to
//! the caller.

pub mod disk;
pub mod memory;
mod store;

pub use store::{PersistentCache, SweeperHandle};

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Keyspace prefix for binary thumbnails.
pub const THUMBNAIL_PREFIX: &str = "thumbnail_";

/// Configuration for the persistent cache.
///
/// ```rust
/// # use streamyyy_net::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new("/tmp/streamyyy")
///     .memory_budget_bytes(8 * 1024 * 1024)
///     .sweep_interval(Duration::from_secs(300));
/// assert_eq!(config.namespace, "api_cache");
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Writable directory supplied by the host (e.g. the OS cache dir).
    pub root: PathBuf,
    /// Subdirectory created under `root`. Default: `api_cache`.
    pub namespace: String,
    /// Byte budget for the memory tier. Default: 50 MiB.
    pub memory_budget_bytes: u64,
    /// Interval of the background expiration sweep. Default: 10 minutes.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            namespace: "api_cache".to_string(),
            memory_budget_bytes: 50 * 1024 * 1024,
            sweep_interval: Duration::from_secs(600),
        }
    }
}

impl CacheConfig {
    /// Default settings rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn memory_budget_bytes(mut self, bytes: u64) -> Self {
        self.memory_budget_bytes = bytes;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Directory holding the payload files.
    pub fn directory(&self) -> PathBuf {
        self.root.join(&self.namespace)
    }
}

/// Default cache root: `~/.cache/streamyyy` (platform equivalent).
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("streamyyy")
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0.0 before any lookup.
    pub hit_rate: f64,
    /// Live entries in the expiration index.
    pub entry_count: usize,
    /// Payload bytes of live entries.
    pub total_size_bytes: u64,
}
