//! Builder for [`ApiClient`] instances

use std::sync::Arc;

use url::Url;

use super::api::ApiClient;
use super::counters::RequestCounters;
use super::credentials::CredentialProvider;
use super::executor::RequestExecutor;
use super::retry::RetryConfig;
use super::transport::{ReqwestTransport, TimeoutConfig, Transport};
use crate::cache::PersistentCache;
use crate::connectivity::ConnectivityMonitor;
use crate::limiter::{RateLimiterRegistry, RateQuota};
use crate::version;
use crate::{NetError, Result};

/// Builder for configuring an [`ApiClient`].
///
/// Every collaborator is injected; anything left unset gets a working
/// default:
///
/// - connectivity: a monitor that [assumes the network is up](ConnectivityMonitor::assume_online)
/// - rate limits: the built-in platform quotas plus the 120/min default
/// - transport: [`ReqwestTransport`] with default timeouts
/// - cache and credentials: none
///
/// ```rust,no_run
/// # use streamyyy_net::{ApiClient, RateQuota, RetryConfig, StaticToken};
/// # use std::sync::Arc;
/// # fn main() -> streamyyy_net::Result<()> {
/// let client = ApiClient::builder()
///     .base_url("https://api.streamyyy.com/v1")
///     .rate_limit("youtube.com", RateQuota::per_minute(100))
///     .retry(RetryConfig::new().max_retries(2))
///     .credentials(Arc::new(StaticToken::new("secret")))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ApiClientBuilder {
    base_url: Option<String>,
    connectivity: Option<Arc<ConnectivityMonitor>>,
    rate_limits: Vec<(String, RateQuota)>,
    default_rate_limit: RateQuota,
    retry: RetryConfig,
    timeouts: TimeoutConfig,
    user_agent: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<PersistentCache>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl ApiClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            connectivity: None,
            rate_limits: Vec::new(),
            default_rate_limit: RateQuota::default(),
            retry: RetryConfig::default(),
            timeouts: TimeoutConfig::default(),
            user_agent: None,
            transport: None,
            cache: None,
            credentials: None,
        }
    }

    /// Base URL that relative endpoint paths are resolved against.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Share a connectivity monitor fed by the host's network signal.
    pub fn connectivity(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.connectivity = Some(monitor);
        self
    }

    /// Quota for `domain` and its subdomains. Overrides a built-in quota for
    /// the same domain.
    pub fn rate_limit(mut self, domain: impl Into<String>, quota: RateQuota) -> Self {
        self.rate_limits.push((domain.into(), quota));
        self
    }

    /// Quota for hosts with no registered domain.
    pub fn default_rate_limit(mut self, quota: RateQuota) -> Self {
        self.default_rate_limit = quota;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Timeouts for the default transport. Ignored with a custom transport.
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// `User-Agent` for the default transport. Ignored with a custom transport.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replace the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cache(mut self, cache: Arc<PersistentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Build the client.
    ///
    /// Fails with [`NetError::InvalidUrl`] for an unparseable or non-HTTP
    /// base URL, or [`NetError::Configuration`] if the default transport
    /// cannot be created.
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self.base_url.as_deref().map(parse_base_url).transpose()?;

        let mut limiters = RateLimiterRegistry::with_known_quotas(self.default_rate_limit);
        for (domain, quota) in self.rate_limits {
            limiters.register(domain, quota);
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let user_agent = self.user_agent.unwrap_or_else(version::user_agent);
                Arc::new(ReqwestTransport::new(self.timeouts, &user_agent)?)
            }
        };

        Ok(ApiClient {
            base_url,
            connectivity: self
                .connectivity
                .unwrap_or_else(|| Arc::new(ConnectivityMonitor::assume_online())),
            limiters,
            executor: RequestExecutor::new(transport, self.retry),
            cache: self.cache,
            credentials: self.credentials,
            counters: RequestCounters::new(),
        })
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| NetError::InvalidUrl(format!("base URL '{raw}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(NetError::InvalidUrl(format!(
            "base URL '{raw}' must be http(s) with a host"
        )));
    }
    Ok(url)
}
