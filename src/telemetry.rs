//! Telemetry metric name constants.
//!
//! Centralised metric names for streamyyy-net operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `streamyyy_net_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `host`: upstream host the request targeted
//! - `status`: outcome: "ok" or the error kind ("timeout", "server_error", ...)
//! - `reason`: why a request was rejected before dispatch
//! - `tier`: cache tier that served a hit: "memory" or "disk"

/// Total requests dispatched to the network.
///
/// Labels: `host`, `status` ("ok" | [`NetError::kind()`](crate::NetError::kind)).
pub const REQUESTS_TOTAL: &str = "streamyyy_net_requests_total";

/// Request duration in seconds, retries included.
///
/// Labels: `host`.
pub const REQUEST_DURATION_SECONDS: &str = "streamyyy_net_request_duration_seconds";

/// Requests currently in flight.
pub const ACTIVE_REQUESTS: &str = "streamyyy_net_active_requests";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `host`.
pub const RETRIES_TOTAL: &str = "streamyyy_net_retries_total";

/// Requests rejected before reaching the network.
///
/// Labels: `reason` ("offline" | "rate_limited" | "invalid_url").
pub const REJECTED_TOTAL: &str = "streamyyy_net_rejected_total";

/// Total cache hits.
///
/// Labels: `tier`.
pub const CACHE_HITS_TOTAL: &str = "streamyyy_net_cache_hits_total";

/// Total cache misses.
pub const CACHE_MISSES_TOTAL: &str = "streamyyy_net_cache_misses_total";

/// Entries purged because they expired (on access or by the sweeper).
pub const CACHE_EXPIRED_TOTAL: &str = "streamyyy_net_cache_expired_total";
