//! Tests for the two-tier persistent cache.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use streamyyy_net::{CacheConfig, PersistentCache};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StreamInfo {
    id: String,
    viewers: u32,
    tags: Vec<String>,
}

fn sample() -> StreamInfo {
    StreamInfo {
        id: "abc123".to_string(),
        viewers: 4200,
        tags: vec!["english".to_string(), "speedrun".to_string()],
    }
}

async fn open(dir: &TempDir) -> PersistentCache {
    PersistentCache::open(CacheConfig::new(dir.path())).await.unwrap()
}

const HOUR: Duration = Duration::from_secs(3600);

// ============================================================================
// Round-trip and expiration
// ============================================================================

#[tokio::test]
async fn store_then_retrieve_round_trips() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    assert!(cache.store("stream:abc123", &sample(), HOUR).await);
    let loaded: Option<StreamInfo> = cache.retrieve("stream:abc123").await;
    assert_eq!(loaded, Some(sample()));
}

#[tokio::test]
async fn expired_entry_is_absent_and_key_is_reusable() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    cache
        .store("short", &sample(), Duration::from_millis(1))
        .await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(cache.retrieve::<StreamInfo>("short").await, None);
    assert_eq!(cache.stats().await.entry_count, 0);

    let fresh = StreamInfo {
        viewers: 1,
        ..sample()
    };
    cache.store("short", &fresh, HOUR).await;
    assert_eq!(cache.retrieve::<StreamInfo>("short").await, Some(fresh));
}

#[tokio::test]
async fn store_replaces_previous_value() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    cache.store("k", &1u32, HOUR).await;
    cache.store("k", &2u32, HOUR).await;
    assert_eq!(cache.retrieve::<u32>("k").await, Some(2));
    assert_eq!(cache.stats().await.entry_count, 1);
}

#[tokio::test]
async fn type_mismatch_reads_as_absent() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    cache.store("k", &"not a stream", HOUR).await;
    assert_eq!(cache.retrieve::<StreamInfo>("k").await, None);
}

// ============================================================================
// Removal
// ============================================================================

#[tokio::test]
async fn remove_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    cache.store("k", &sample(), HOUR).await;
    cache.remove("k").await;
    cache.remove("k").await;
    cache.remove("never-stored").await;

    assert_eq!(cache.retrieve::<StreamInfo>("k").await, None);
}

#[tokio::test]
async fn clear_all_empties_both_tiers() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    cache.store("a", &1u32, HOUR).await;
    cache.store("b", &2u32, HOUR).await;
    cache.clear_all().await;

    assert_eq!(cache.retrieve::<u32>("a").await, None);
    assert_eq!(cache.retrieve::<u32>("b").await, None);
    assert_eq!(cache.stats().await.entry_count, 0);

    // Still usable after the directory was recreated.
    assert!(cache.store("c", &3u32, HOUR).await);
    assert_eq!(cache.retrieve::<u32>("c").await, Some(3));
}

#[tokio::test]
async fn cancelled_clear_all_leaves_the_cache_writable() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;
    for i in 0..3000u32 {
        cache.store(&format!("k{i}"), &i, HOUR).await;
    }

    let cancelled = tokio::time::timeout(Duration::from_millis(1), cache.clear_all())
        .await
        .is_err();

    // A cancelled removal keeps running in the background; wait for it.
    let root = cache.config().directory();
    for _ in 0..500 {
        let payloads = std::fs::read_dir(&root)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_file())
                    .count()
            })
            .unwrap_or(0);
        if payloads == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(cache.store("b", &2u32, HOUR).await, "cancelled: {cancelled}");
    assert_eq!(cache.retrieve::<u32>("b").await, Some(2));
}

#[tokio::test]
async fn store_recreates_a_deleted_cache_dir() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;
    std::fs::remove_dir_all(cache.config().directory()).unwrap();

    assert!(cache.store("a", &1u32, HOUR).await);
    cache.remove("a").await;
    assert!(cache.store("a", &2u32, HOUR).await);
    assert_eq!(cache.retrieve::<u32>("a").await, Some(2));
}

#[tokio::test]
async fn sweep_removes_only_expired_entries() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    cache.store("old-1", &1u32, Duration::from_millis(1)).await;
    cache.store("old-2", &2u32, Duration::from_millis(1)).await;
    cache.store("live", &3u32, HOUR).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(cache.sweep_expired().await, 2);
    assert_eq!(cache.sweep_expired().await, 0);
    assert_eq!(cache.stats().await.entry_count, 1);
    assert_eq!(cache.retrieve::<u32>("live").await, Some(3));
}

#[tokio::test]
async fn sweeper_task_purges_in_background() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::new(dir.path()).sweep_interval(Duration::from_millis(20));
    let cache = Arc::new(PersistentCache::open(config).await.unwrap());
    let sweeper = cache.spawn_sweeper();

    cache.store("gone", &1u32, Duration::from_millis(1)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cache.stats().await.entry_count, 0);
    sweeper.shutdown().await;
}

// ============================================================================
// Statistics
// ============================================================================

#[tokio::test]
async fn hit_rate_after_one_miss_and_one_hit() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    assert_eq!(cache.hit_rate(), 0.0);
    assert_eq!(cache.retrieve::<u32>("missing").await, None);
    cache.store("present", &7u32, HOUR).await;
    assert_eq!(cache.retrieve::<u32>("present").await, Some(7));

    let stats = cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.5);
    assert_eq!(cache.hit_rate(), 0.5);
}

#[tokio::test]
async fn stats_track_payload_size() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;

    cache.store_raw("a", Bytes::from_static(b"12345"), HOUR).await;
    cache.store_raw("b", Bytes::from_static(b"123"), HOUR).await;

    let stats = cache.stats().await;
    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.total_size_bytes, 8);
    assert!(cache.disk_usage().await >= 8);
}

// ============================================================================
// Thumbnails and tiers
// ============================================================================

#[tokio::test]
async fn thumbnails_live_in_their_own_keyspace() {
    let dir = TempDir::new().unwrap();
    let cache = open(&dir).await;
    let png = Bytes::from_static(&[0x89, b'P', b'N', b'G', 0, 1, 2, 3]);

    cache.store_thumbnail("stream-1", png.clone(), HOUR).await;
    cache.store("stream-1", &sample(), HOUR).await;

    assert_eq!(cache.retrieve_thumbnail("stream-1").await, Some(png));
    assert_eq!(cache.retrieve::<StreamInfo>("stream-1").await, Some(sample()));

    cache.remove_thumbnail("stream-1").await;
    assert_eq!(cache.retrieve_thumbnail("stream-1").await, None);
    assert_eq!(cache.retrieve::<StreamInfo>("stream-1").await, Some(sample()));
}

#[tokio::test]
async fn entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let cache = open(&dir).await;
        cache.store("persisted", &sample(), HOUR).await;
        cache.store("expiring", &1u32, Duration::from_millis(1)).await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    let reopened = open(&dir).await;
    assert_eq!(reopened.stats().await.entry_count, 1);
    assert_eq!(
        reopened.retrieve::<StreamInfo>("persisted").await,
        Some(sample())
    );
    assert_eq!(reopened.retrieve::<u32>("expiring").await, None);
}

#[tokio::test]
async fn oversized_entries_are_served_from_disk() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig::new(dir.path()).memory_budget_bytes(16);
    let cache = PersistentCache::open(config).await.unwrap();
    let payload = Bytes::from(vec![7u8; 4096]);

    cache.store_raw("big", payload.clone(), HOUR).await;
    assert_eq!(cache.retrieve_raw("big").await, Some(payload));
    assert_eq!(cache.stats().await.hits, 1);
}

#[tokio::test]
async fn namespaces_are_isolated() {
    let dir = TempDir::new().unwrap();
    let a = PersistentCache::open(CacheConfig::new(dir.path()).namespace("a"))
        .await
        .unwrap();
    let b = PersistentCache::open(CacheConfig::new(dir.path()).namespace("b"))
        .await
        .unwrap();

    a.store("k", &1u32, HOUR).await;
    assert_eq!(b.retrieve::<u32>("k").await, None);
    assert!(dir.path().join("a").join("metadata").is_dir());
}
