//! Per-host sliding-window rate limiting.
//!
//! A [`RateLimiter`] admits at most `max_requests` within any trailing
//! `window`. The [`RateLimiterRegistry`] maps upstream hosts to limiters and
//! is owned by the [`ApiClient`](crate::ApiClient).
//!
//! # Host matching
//!
//! Quotas are registered per domain. A registration for `twitch.tv` covers
//! `twitch.tv` itself and every subdomain (`api.twitch.tv`, `id.twitch.tv`)
//! and those hosts share one window, since upstream quotas are usually
//! enforced per account rather than per hostname. Matching is on whole DNS
//! labels, so `nottwitch.tv` does not match. The longest registration wins.
//! Hosts with no registration each get their own limiter with the default
//! quota.
//!
//! Time comes from `tokio::time::Instant`, so tests can pause and advance the
//! clock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::debug;

/// A request quota: `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateQuota {
    pub max_requests: usize,
    #[serde(rename = "window_secs", with = "duration_secs")]
    pub window: Duration,
}

impl RateQuota {
    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// `max_requests` per minute.
    pub const fn per_minute(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }
}

impl Default for RateQuota {
    fn default() -> Self {
        Self::per_minute(120)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Quotas published by upstream platforms the client talks to.
///
/// Helix allows 800 points per minute per client.
pub fn known_quotas() -> Vec<(String, RateQuota)> {
    vec![("twitch.tv".to_string(), RateQuota::per_minute(800))]
}

/// Sliding-window limiter for one host.
///
/// All operations take a short `std::sync::Mutex`; nothing awaits while
/// holding it.
#[derive(Debug)]
pub struct RateLimiter {
    quota: RateQuota,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_quota(RateQuota::new(max_requests, window))
    }

    pub fn with_quota(quota: RateQuota) -> Self {
        Self {
            quota,
            timestamps: Mutex::new(VecDeque::with_capacity(quota.max_requests.min(1024))),
        }
    }

    pub fn quota(&self) -> RateQuota {
        self.quota
    }

    /// Prune the window and report whether another request fits.
    ///
    /// Does not reserve the slot; see [`try_acquire()`](Self::try_acquire).
    pub fn can_make_request(&self) -> bool {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, Instant::now());
        timestamps.len() < self.quota.max_requests
    }

    /// Record a request made now.
    pub fn record_request(&self) {
        self.lock().push_back(Instant::now());
    }

    /// Admit and record in one step.
    ///
    /// Two concurrent callers can never both take the last slot. Denied
    /// requests are not recorded.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);
        if timestamps.len() < self.quota.max_requests {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Requests still inside the window.
    pub fn in_window(&self) -> usize {
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, Instant::now());
        timestamps.len()
    }

    /// Time until the oldest request leaves the window, or `None` if a slot
    /// is free now.
    pub fn time_until_available(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut timestamps = self.lock();
        self.prune(&mut timestamps, now);
        if timestamps.len() < self.quota.max_requests {
            return None;
        }
        timestamps
            .front()
            .map(|oldest| (*oldest + self.quota.window).saturating_duration_since(now))
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.quota.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        self.timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Lazily populated host → limiter mapping.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    quotas: Vec<(String, RateQuota)>,
    default_quota: RateQuota,
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    /// Empty registry: every host gets `default_quota`.
    pub fn new(default_quota: RateQuota) -> Self {
        Self {
            quotas: Vec::new(),
            default_quota,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Registry preloaded with [`known_quotas()`].
    pub fn with_known_quotas(default_quota: RateQuota) -> Self {
        let mut registry = Self::new(default_quota);
        for (domain, quota) in known_quotas() {
            registry.register(domain, quota);
        }
        registry
    }

    /// Register (or replace) the quota for `domain` and its subdomains.
    pub fn register(&mut self, domain: impl Into<String>, quota: RateQuota) {
        let domain = normalize_host(&domain.into());
        self.quotas.retain(|(d, _)| *d != domain);
        self.quotas.push((domain, quota));
        // Longest registration first so the most specific wins.
        self.quotas.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
    }

    pub fn default_quota(&self) -> RateQuota {
        self.default_quota
    }

    /// The registration key and quota that govern `host`.
    pub fn resolve(&self, host: &str) -> (String, RateQuota) {
        let host = normalize_host(host);
        self.quotas
            .iter()
            .find(|(domain, _)| domain_matches(&host, domain))
            .map(|(domain, quota)| (domain.clone(), *quota))
            .unwrap_or((host, self.default_quota))
    }

    /// Limiter for `host`, created on first use.
    pub fn limiter_for(&self, host: &str) -> Arc<RateLimiter> {
        let (key, quota) = self.resolve(host);
        let mut limiters = self
            .limiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        limiters
            .entry(key)
            .or_insert_with_key(|key| {
                debug!(
                    key,
                    max_requests = quota.max_requests,
                    window_secs = quota.window.as_secs_f64(),
                    "creating rate limiter"
                );
                Arc::new(RateLimiter::with_quota(quota))
            })
            .clone()
    }

    /// Number of limiters created so far.
    pub fn len(&self) -> usize {
        self.limiters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::with_known_quotas(RateQuota::default())
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
