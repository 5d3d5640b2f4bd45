//! Retry configuration and delay calculation.
//!
//! Provides [`RetryConfig`] for controlling retry behaviour and the shared
//! `with_retry()` helper used by the [`RequestExecutor`](super::RequestExecutor).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::Result;
use crate::telemetry;

/// Lower bound on any retry delay; retries never busy-loop.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Configuration for retry behaviour on transient errors.
///
/// Uses deterministic exponential backoff without jitter, so tests can
/// predict every delay:
///
/// ```rust
/// # use streamyyy_net::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the initial attempt. 0 = no retry. Default: 3.
    pub max_retries: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries after the initial attempt.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry number `attempt + 1` (0-indexed).
    ///
    /// `initial_delay * 2^attempt`, capped at `max_delay`, never below
    /// [`MIN_RETRY_DELAY`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay).max(MIN_RETRY_DELAY)
    }

    /// Worst-case backoff sleep across all retries.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_retries)
            .map(|attempt| self.delay_for_attempt(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

/// Execute an async operation with retry logic.
///
/// Retries transient errors (as classified by
/// [`NetError::is_transient()`](crate::NetError::is_transient)) up to
/// `retries` times after the first attempt. Permanent errors are returned
/// immediately.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    retries: u32,
    host: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempt < retries => {
                let delay = config.delay_for_attempt(attempt);
                metrics::counter!(telemetry::RETRIES_TOTAL, "host" => host.to_owned())
                    .increment(1);
                warn!(
                    host,
                    attempt = attempt + 1,
                    max_retries = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
