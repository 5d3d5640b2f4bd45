//! HTTP transport seam.
//!
//! [`Transport`] is the only place bytes cross the network. The default
//! [`ReqwestTransport`] wraps a `reqwest::Client`; tests inject their own
//! implementation (or point the default one at wiremock).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use url::Url;

use crate::error::NetworkFailure;
use crate::{NetError, Result};

/// A fully built request, ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A response whose body has been read to completion.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends one request, once. No retries, no status interpretation.
///
/// Implementations report transport failures as [`NetError::Network`];
/// any HTTP status, including errors, is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Per-attempt timeouts.
///
/// ```rust
/// # use streamyyy_net::TimeoutConfig;
/// let timeouts = TimeoutConfig::default();
/// assert_eq!(timeouts.request.as_secs(), 30);
/// assert_eq!(timeouts.resource.as_secs(), 60);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Maximum idle time waiting for connect or the next bytes. Default: 30s.
    pub request: Duration,
    /// Maximum total time for one attempt. Default: 60s.
    pub resource: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            resource: Duration::from_secs(60),
        }
    }
}

impl TimeoutConfig {
    pub fn new(request: Duration, resource: Duration) -> Self {
        Self { request, resource }
    }
}

/// [`Transport`] backed by `reqwest` with rustls.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Build a transport with the given timeouts and `User-Agent`.
    pub fn new(timeouts: TimeoutConfig, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(timeouts.request)
            .read_timeout(timeouts.request)
            .timeout(timeouts.resource)
            .user_agent(user_agent)
            .build()
            .map_err(|e| NetError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> NetError {
    if err.is_timeout() {
        NetError::Network(NetworkFailure::Timeout)
    } else {
        NetError::Network(NetworkFailure::Transport(err.to_string()))
    }
}
