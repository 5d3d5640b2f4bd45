//! Request counters and the metrics snapshot exposed to callers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::telemetry;

/// Monotonic request counters plus the in-flight gauge.
///
/// Only [`InFlight`] guards change `active`, so the gauge cannot go
/// negative and returns to its previous value on every exit path,
/// including a dropped (cancelled) request future.
#[derive(Debug, Default)]
pub struct RequestCounters {
    active: AtomicU64,
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
}

impl RequestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request as dispatched.
    pub(crate) fn begin(&self) -> InFlight<'_> {
        self.total.fetch_add(1, Ordering::Relaxed);
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::gauge!(telemetry::ACTIVE_REQUESTS).set(active as f64);
        InFlight { counters: self }
    }

    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn successful(&self) -> u64 {
        self.successful.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// `successful / total`, 0.0 before the first request.
    pub fn success_rate(&self) -> f64 {
        rate(self.successful(), self.total())
    }

    /// `failed / total`, 0.0 before the first request.
    pub fn error_rate(&self) -> f64 {
        rate(self.failed(), self.total())
    }
}

/// RAII marker for one in-flight request.
pub(crate) struct InFlight<'a> {
    counters: &'a RequestCounters,
}

impl InFlight<'_> {
    pub(crate) fn succeed(self) {
        self.counters.successful.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fail(self) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let active = self.counters.active.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::gauge!(telemetry::ACTIVE_REQUESTS).set(active as f64);
    }
}

/// Point-in-time view of request and cache metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RequestMetrics {
    pub active_requests: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    /// 0.0 when the client has no cache.
    pub cache_hit_rate: f64,
    /// Payload bytes held by the cache; 0 when the client has no cache.
    pub cache_size: u64,
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
