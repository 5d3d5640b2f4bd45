//! In-memory tier: a byte-weighted moka LRU.

use bytes::Bytes;
use moka::sync::Cache;

/// Bounded in-process tier. Entries are weighed by key + payload length;
/// moka evicts by recency/frequency once the byte budget is exceeded.
///
/// All operations are synchronous; [`PersistentCache`](super::PersistentCache)
/// relies on that inside its commit sections.
pub struct MemoryTier {
    entries: Cache<String, Bytes>,
}

impl MemoryTier {
    pub fn new(budget_bytes: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(budget_bytes)
            .weigher(|key: &String, value: &Bytes| {
                u32::try_from(key.len() + value.len()).unwrap_or(u32::MAX)
            })
            .build();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key)
    }

    pub fn insert(&self, key: &str, value: Bytes) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Approximate entry count; moka applies evictions lazily.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush moka's pending maintenance so counts are exact.
    pub fn sync(&self) {
        self.entries.run_pending_tasks();
    }
}
