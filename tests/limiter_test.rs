//! Tests for sliding-window rate limiting.

use std::sync::Arc;
use std::time::Duration;

use streamyyy_net::{RateLimiter, RateLimiterRegistry, RateQuota};

#[tokio::test(start_paused = true)]
async fn three_per_minute_admits_then_recovers() {
    let limiter = RateLimiter::new(3, Duration::from_secs(60));

    for _ in 0..3 {
        assert!(limiter.can_make_request());
        limiter.record_request();
    }
    assert!(!limiter.can_make_request());
    assert_eq!(limiter.in_window(), 3);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(limiter.can_make_request());
    assert_eq!(limiter.in_window(), 0);
}

#[tokio::test(start_paused = true)]
async fn window_slides_per_request() {
    let limiter = RateLimiter::new(2, Duration::from_secs(10));

    assert!(limiter.try_acquire());
    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());

    // The first request leaves the window at t=10s, the second at t=16s.
    assert_eq!(limiter.time_until_available(), Some(Duration::from_secs(4)));
    tokio::time::advance(Duration::from_secs(4)).await;
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());
}

#[tokio::test(start_paused = true)]
async fn denied_requests_are_not_recorded() {
    let limiter = RateLimiter::new(1, Duration::from_secs(1));
    assert!(limiter.try_acquire());
    for _ in 0..10 {
        assert!(!limiter.try_acquire());
    }
    assert_eq!(limiter.in_window(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(limiter.try_acquire());
}

#[test]
fn free_limiter_reports_no_wait() {
    let limiter = RateLimiter::new(5, Duration::from_secs(60));
    assert_eq!(limiter.time_until_available(), None);
}

#[test]
fn zero_quota_denies_everything() {
    let limiter = RateLimiter::new(0, Duration::from_secs(60));
    assert!(!limiter.can_make_request());
    assert!(!limiter.try_acquire());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquire_never_exceeds_quota() {
    let limiter = Arc::new(RateLimiter::new(25, Duration::from_secs(60)));

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.try_acquire() })
        })
        .collect();

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 25);
    assert_eq!(limiter.in_window(), 25);
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn subdomains_share_the_registered_window() {
    let mut registry = RateLimiterRegistry::new(RateQuota::per_minute(100));
    registry.register("example.com", RateQuota::per_minute(2));

    assert!(registry.limiter_for("api.example.com").try_acquire());
    assert!(registry.limiter_for("cdn.example.com").try_acquire());
    assert!(!registry.limiter_for("example.com").try_acquire());
    assert_eq!(registry.len(), 1);
}

#[test]
fn unregistered_hosts_get_separate_limiters() {
    let registry = RateLimiterRegistry::new(RateQuota::per_minute(1));

    assert!(registry.limiter_for("a.example").try_acquire());
    assert!(registry.limiter_for("b.example").try_acquire());
    assert!(!registry.limiter_for("a.example").try_acquire());
    assert_eq!(registry.len(), 2);
}

#[test]
fn limiters_are_created_lazily() {
    let registry = RateLimiterRegistry::default();
    assert!(registry.is_empty());

    let first = registry.limiter_for("api.twitch.tv");
    let second = registry.limiter_for("id.twitch.tv");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.quota(), RateQuota::per_minute(800));
}
