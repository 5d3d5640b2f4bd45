//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. Explicit path (e.g. `--config <path>`)
//! 2. `~/.streamyyy/config.toml` (user)
//! 3. `/etc/streamyyy/config.toml` (system)
//!
//! The API token is loaded separately with mandatory permission checks:
//! 1. `~/.streamyyy/secrets.toml` (user, must be 0600)
//! 2. `/etc/streamyyy/secrets.toml` (system, must be 0600)
//! 3. `STREAMYYY_API_TOKEN` environment variable

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::cache::{CacheConfig, default_cache_root};
use crate::client::{ApiClientBuilder, CredentialProvider, RetryConfig, TimeoutConfig};
use crate::limiter::RateQuota;
use crate::{NetError, Result};

/// Environment variable consulted when no secrets file provides a token.
pub const API_TOKEN_ENV: &str = "STREAMYYY_API_TOKEN";

/// Client configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub cache: CacheSection,
    /// Per-domain quotas, in addition to the built-in platform quotas.
    #[serde(default)]
    pub rate_limits: Vec<RateLimitEntry>,
    /// Quota for hosts without a registered domain (default: 120 per 60s).
    #[serde(default)]
    pub default_rate_limit: Option<RateQuota>,
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSection {
    /// Base URL for relative endpoint paths.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-attempt connect/idle timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Per-attempt total timeout in seconds (default: 60).
    #[serde(default = "default_resource_timeout")]
    pub resource_timeout_secs: u64,
    /// Override for the `User-Agent` header.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: default_request_timeout(),
            resource_timeout_secs: default_resource_timeout(),
            user_agent: None,
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_resource_timeout() -> u64 {
    60
}

/// Retry settings for transient failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds (default: 500).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap on any retry delay in milliseconds (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// Persistent cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Cache root (default: the platform cache dir + `streamyyy`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Subdirectory under `dir` (default: `api_cache`).
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Memory tier budget in megabytes (default: 50).
    #[serde(default = "default_memory_budget_mb")]
    pub memory_budget_mb: u64,
    /// Expiration sweep interval in seconds (default: 600).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: None,
            namespace: default_namespace(),
            memory_budget_mb: default_memory_budget_mb(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_namespace() -> String {
    "api_cache".to_string()
}

fn default_memory_budget_mb() -> u64 {
    50
}

fn default_sweep_interval() -> u64 {
    600
}

/// A `[[rate_limits]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitEntry {
    /// Domain covered by the quota, subdomains included.
    pub domain: String,
    pub max_requests: usize,
    /// Window length in seconds (fractions allowed).
    pub window_secs: f64,
}

impl RateLimitEntry {
    pub fn quota(&self) -> Result<RateQuota> {
        let window = Duration::try_from_secs_f64(self.window_secs).map_err(|e| {
            NetError::Configuration(format!(
                "invalid window_secs for rate limit '{}': {e}",
                self.domain
            ))
        })?;
        Ok(RateQuota::new(self.max_requests, window))
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.streamyyy/config.toml`
    /// 3. `/etc/streamyyy/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            NetError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml(&content)
            .map_err(|e| NetError::Configuration(format!("Failed to parse config file {path:?}: {e}")))
    }

    /// Load like [`load()`](Self::load), falling back to defaults when no
    /// file exists in the standard locations.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        if explicit_path.is_none() && Self::standard_config_path().is_none() {
            return Ok(Self::default());
        }
        Self::load(explicit_path)
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| NetError::Configuration(e.to_string()))
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(NetError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        Self::standard_config_path().ok_or_else(|| {
            NetError::Configuration(
                "No config file found. Create ~/.streamyyy/config.toml or /etc/streamyyy/config.toml"
                    .to_string(),
            )
        })
    }

    fn standard_config_path() -> Option<PathBuf> {
        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".streamyyy").join("config.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/streamyyy/config.toml");
        system_config.exists().then_some(system_config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_retries(self.retry.max_retries)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        TimeoutConfig::new(
            Duration::from_secs(self.client.request_timeout_secs),
            Duration::from_secs(self.client.resource_timeout_secs),
        )
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.cache.dir.clone().unwrap_or_else(default_cache_root))
            .namespace(self.cache.namespace.clone())
            .memory_budget_bytes(self.cache.memory_budget_mb.saturating_mul(1024 * 1024))
            .sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs))
    }

    /// A client builder carrying every setting from this file.
    ///
    /// Connectivity, cache and credentials are still injected by the caller.
    pub fn client_builder(&self) -> Result<ApiClientBuilder> {
        let mut builder = ApiClientBuilder::new()
            .retry(self.retry_config())
            .timeouts(self.timeouts());
        if let Some(url) = &self.client.base_url {
            builder = builder.base_url(url.clone());
        }
        if let Some(user_agent) = &self.client.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        if let Some(quota) = self.default_rate_limit {
            builder = builder.default_rate_limit(quota);
        }
        for entry in &self.rate_limits {
            builder = builder.rate_limit(entry.domain.clone(), entry.quota()?);
        }
        Ok(builder)
    }
}

/// Secrets (the API token).
#[derive(Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub api_token: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.streamyyy/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/streamyyy/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists ([`api_token()`](Self::api_token)
    /// then falls back to the environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".streamyyy").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/streamyyy/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a specific secrets file. The permission check still applies.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            NetError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            NetError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            NetError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(NetError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The API token, falling back to `STREAMYYY_API_TOKEN`.
    pub fn api_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .or_else(|| std::env::var(API_TOKEN_ENV).ok())
            .filter(|token| !token.is_empty())
    }
}

#[async_trait]
impl CredentialProvider for Secrets {
    async fn bearer_token(&self) -> Option<String> {
        self.api_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.client.request_timeout_secs, 30);
        assert_eq!(config.client.resource_timeout_secs, 60);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.cache.namespace, "api_cache");
        assert_eq!(config.cache.memory_budget_mb, 50);
        assert!(config.rate_limits.is_empty());
        assert_eq!(config.retry_config(), RetryConfig::default());
        assert_eq!(config.timeouts(), TimeoutConfig::default());
    }

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_toml(
            r#"
            [client]
            base_url = "https://api.streamyyy.com/v1"
        "#,
        )
        .unwrap();
        assert_eq!(
            config.client.base_url.as_deref(),
            Some("https://api.streamyyy.com/v1")
        );
        // Defaults preserved
        assert_eq!(config.client.request_timeout_secs, 30);
        assert_eq!(config.cache.sweep_interval_secs, 600);
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            [client]
            base_url = "https://api.streamyyy.com/v1"
            request_timeout_secs = 10
            resource_timeout_secs = 20
            user_agent = "streamyyy-test"

            [retry]
            max_retries = 5
            initial_delay_ms = 100
            max_delay_ms = 2000

            [cache]
            dir = "/tmp/streamyyy"
            namespace = "test_cache"
            memory_budget_mb = 8
            sweep_interval_secs = 30

            [[rate_limits]]
            domain = "youtube.com"
            max_requests = 100
            window_secs = 60

            [[rate_limits]]
            domain = "kick.com"
            max_requests = 10
            window_secs = 1.5

            [default_rate_limit]
            max_requests = 30
            window_secs = 60
        "#,
        )
        .unwrap();

        assert_eq!(config.retry_config().max_retries, 5);
        assert_eq!(
            config.timeouts(),
            TimeoutConfig::new(Duration::from_secs(10), Duration::from_secs(20))
        );

        let cache = config.cache_config();
        assert_eq!(cache.directory(), PathBuf::from("/tmp/streamyyy/test_cache"));
        assert_eq!(cache.memory_budget_bytes, 8 * 1024 * 1024);
        assert_eq!(cache.sweep_interval, Duration::from_secs(30));

        assert_eq!(config.rate_limits.len(), 2);
        assert_eq!(
            config.rate_limits[1].quota().unwrap(),
            RateQuota::new(10, Duration::from_millis(1500))
        );
        assert_eq!(config.default_rate_limit, Some(RateQuota::per_minute(30)));
    }

    #[test]
    fn client_builder_applies_rate_limits() {
        let config = Config::from_toml(
            r#"
            [[rate_limits]]
            domain = "youtube.com"
            max_requests = 100
            window_secs = 60

            [default_rate_limit]
            max_requests = 7
            window_secs = 1
        "#,
        )
        .unwrap();
        let client = config.client_builder().unwrap().build().unwrap();
        let limiters = client.rate_limiters();
        assert_eq!(limiters.resolve("www.youtube.com").1.max_requests, 100);
        assert_eq!(limiters.resolve("example.org").1.max_requests, 7);
    }

    #[test]
    fn negative_window_is_rejected() {
        let entry = RateLimitEntry {
            domain: "example.com".into(),
            max_requests: 1,
            window_secs: -1.0,
        };
        assert!(matches!(entry.quota(), Err(NetError::Configuration(_))));
    }

    #[test]
    fn malformed_toml_is_configuration_error() {
        let err = Config::from_toml("[client\nbase_url = 1").unwrap_err();
        assert!(matches!(err, NetError::Configuration(_)));
    }

    #[test]
    fn parse_secrets() {
        let secrets: Secrets = toml::from_str(r#"api_token = "tok-from-file""#).unwrap();
        assert_eq!(secrets.api_token(), Some("tok-from-file".to_string()));
        assert!(!format!("{secrets:?}").contains("tok-from-file"));
    }
}
