//! The request orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::builder::ApiClientBuilder;
use super::counters::{RequestCounters, RequestMetrics};
use super::credentials::CredentialProvider;
use super::endpoint::{CachePolicy, Endpoint};
use super::executor::{RequestExecutor, decode_json};
use super::transport::HttpRequest;
use crate::cache::PersistentCache;
use crate::connectivity::ConnectivityMonitor;
use crate::limiter::RateLimiterRegistry;
use crate::telemetry;
use crate::{NetError, Result};

const JSON: &str = "application/json";

/// Client for the Streamyyy backend and the streaming platforms behind it.
///
/// Every request goes through the same gates in order: URL validation,
/// connectivity, the per-host rate limiter, then the executor. A rejected
/// request never reaches the network and never moves the counters.
pub struct ApiClient {
    pub(super) base_url: Option<Url>,
    pub(super) connectivity: Arc<ConnectivityMonitor>,
    pub(super) limiters: RateLimiterRegistry,
    pub(super) executor: RequestExecutor,
    pub(super) cache: Option<Arc<PersistentCache>>,
    pub(super) credentials: Option<Arc<dyn CredentialProvider>>,
    pub(super) counters: RequestCounters,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Execute `endpoint` and decode the JSON response into `T`.
    pub async fn request<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> Result<T> {
        self.request_with_retries(endpoint, self.executor.retry_config().max_retries)
            .await
    }

    /// Like [`request()`](Self::request) with an explicit retry budget.
    pub async fn request_with_retries<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        retries: u32,
    ) -> Result<T> {
        self.dispatch(endpoint, retries, |body| decode_json(body)).await
    }

    /// Execute `endpoint` and return the raw response body.
    pub async fn request_raw(&self, endpoint: &Endpoint) -> Result<Bytes> {
        let retries = self.executor.retry_config().max_retries;
        self.dispatch(endpoint, retries, |body| Ok(body.clone())).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(&Endpoint::get(path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(&Endpoint::post(path).json(body)?).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(&Endpoint::put(path).json(body)?).await
    }

    /// `DELETE path`. The response body, if any, is ignored.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let retries = self.executor.retry_config().max_retries;
        self.dispatch(&Endpoint::delete(path), retries, |_| Ok(())).await
    }

    /// Fetch image bytes, serving from the thumbnail keyspace when possible.
    ///
    /// Thumbnails are keyed by their resolved URL and stored for `ttl` after
    /// a successful fetch.
    pub async fn fetch_thumbnail(&self, url_or_path: &str, ttl: Duration) -> Result<Bytes> {
        let endpoint = Endpoint::new(Method::GET, url_or_path).header("Accept", "image/*");
        let url = endpoint.url(self.base_url.as_ref())?;

        if let Some(cache) = &self.cache
            && let Some(data) = cache.retrieve_thumbnail(url.as_str()).await
        {
            return Ok(data);
        }

        let retries = self.executor.retry_config().max_retries;
        let data = self
            .dispatch(&endpoint, retries, |body| Ok(body.clone()))
            .await?;
        if let Some(cache) = &self.cache {
            cache.store_thumbnail(url.as_str(), data.clone(), ttl).await;
        }
        Ok(data)
    }

    // ========================================================================
    // Metrics & accessors
    // ========================================================================

    /// Snapshot of the request counters and cache statistics.
    pub async fn metrics(&self) -> RequestMetrics {
        let (cache_hit_rate, cache_size) = match &self.cache {
            Some(cache) => {
                let stats = cache.stats().await;
                (stats.hit_rate, stats.total_size_bytes)
            }
            None => (0.0, 0),
        };
        RequestMetrics {
            active_requests: self.counters.active(),
            total_requests: self.counters.total(),
            successful_requests: self.counters.successful(),
            failed_requests: self.counters.failed(),
            success_rate: self.counters.success_rate(),
            error_rate: self.counters.error_rate(),
            cache_hit_rate,
            cache_size,
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.counters.success_rate()
    }

    pub fn error_rate(&self) -> f64 {
        self.counters.error_rate()
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    pub fn cache(&self) -> Option<&Arc<PersistentCache>> {
        self.cache.as_ref()
    }

    pub fn rate_limiters(&self) -> &RateLimiterRegistry {
        &self.limiters
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn dispatch<T, D>(&self, endpoint: &Endpoint, retries: u32, decode: D) -> Result<T>
    where
        D: Fn(&Bytes) -> Result<T>,
    {
        let url = endpoint
            .url(self.base_url.as_ref())
            .inspect_err(|e| reject(e.kind()))?;
        let cache_key = response_cache_key(endpoint.method(), &url);

        if let (CachePolicy::CacheFirst { .. }, Some(cache)) = (endpoint.policy(), &self.cache)
            && let Some(body) = cache.retrieve_raw(&cache_key).await
        {
            match decode(&body) {
                Ok(value) => {
                    debug!(url = %url, "served from cache");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "dropping undecodable cache entry");
                    cache.remove(&cache_key).await;
                }
            }
        }

        if !self.connectivity.is_connected() {
            reject("offline");
            debug!(url = %url, "rejected: offline");
            return Err(NetError::offline());
        }

        let host = url.host_str().unwrap_or_default().to_owned();
        if !self.limiters.limiter_for(&host).try_acquire() {
            reject("rate_limited");
            debug!(host, "rejected: rate limit window full");
            return Err(NetError::RateLimited);
        }

        let in_flight = self.counters.begin();
        let started = Instant::now();
        let outcome = match self.build_request(endpoint, url).await {
            Ok(request) => self
                .executor
                .execute_with_retries(&request, retries)
                .await
                .and_then(|body| decode(&body).map(|value| (value, body))),
            Err(e) => Err(e),
        };
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS, "host" => host.clone())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok((value, body)) => {
                in_flight.succeed();
                metrics::counter!(telemetry::REQUESTS_TOTAL, "host" => host, "status" => "ok")
                    .increment(1);
                if let (Some(ttl), Some(cache)) = (endpoint.policy().store_ttl(), &self.cache) {
                    cache.store_raw(&cache_key, body, ttl).await;
                }
                Ok(value)
            }
            Err(e) => {
                in_flight.fail();
                metrics::counter!(
                    telemetry::REQUESTS_TOTAL,
                    "host" => host.clone(),
                    "status" => e.kind()
                )
                .increment(1);
                warn!(host, error = %e, kind = e.kind(), "request failed");
                Err(e)
            }
        }
    }

    async fn build_request(&self, endpoint: &Endpoint, url: Url) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(endpoint.method().clone(), url);
        request.headers.insert(ACCEPT, HeaderValue::from_static(JSON));
        if let Some(body) = endpoint.body_bytes() {
            request.headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
            request.body = Some(body.clone());
        }

        for (name, value) in endpoint.headers() {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NetError::Encoding(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| NetError::Encoding(format!("invalid value for header '{name}': {e}")))?;
            request.headers.insert(header, value);
        }

        if let Some(credentials) = &self.credentials
            && let Some(token) = credentials.bearer_token().await
        {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| NetError::Encoding("bearer token is not a valid header value".into()))?;
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_ref().map(Url::as_str))
            .field("cache", &self.cache)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

/// Cache key for a response body: method plus the fully resolved URL.
pub fn response_cache_key(method: &Method, url: &Url) -> String {
    format!("response:{method} {url}")
}

fn reject(reason: &'static str) {
    metrics::counter!(telemetry::REJECTED_TOTAL, "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_includes_method_and_query() {
        let url = Url::parse("https://api.example.com/streams?first=20").unwrap();
        assert_eq!(
            response_cache_key(&Method::GET, &url),
            "response:GET https://api.example.com/streams?first=20"
        );
        assert_ne!(
            response_cache_key(&Method::GET, &url),
            response_cache_key(&Method::POST, &url)
        );
    }
}
