//! Endpoint descriptors and URL resolution.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use url::Url;

use super::executor::encode_json;
use crate::{NetError, Result};

/// How a request interacts with the [`PersistentCache`](crate::PersistentCache).
///
/// Policies other than `NetworkOnly` are ignored when the client was built
/// without a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Always hit the network; never read or write the cache.
    #[default]
    NetworkOnly,
    /// Serve a cached body if one is live; otherwise fetch and store it for
    /// `ttl`. A cache hit skips connectivity, rate limiting and counters.
    CacheFirst { ttl: Duration },
    /// Always fetch; store the successful body for `ttl`.
    NetworkThenStore { ttl: Duration },
}

impl CachePolicy {
    /// TTL for storing a successful response, if this policy stores at all.
    pub fn store_ttl(&self) -> Option<Duration> {
        match self {
            CachePolicy::NetworkOnly => None,
            CachePolicy::CacheFirst { ttl } | CachePolicy::NetworkThenStore { ttl } => Some(*ttl),
        }
    }
}

/// Immutable description of one logical API call.
///
/// `path` is either relative to the client's base URL (`"streams/top"`)
/// or an absolute `http(s)` URL.
///
/// ```rust
/// # use streamyyy_net::{CachePolicy, Endpoint};
/// # use std::time::Duration;
/// let endpoint = Endpoint::get("streams")
///     .query("first", "20")
///     .header("Client-Id", "abc")
///     .cache_policy(CachePolicy::CacheFirst { ttl: Duration::from_secs(60) });
/// assert_eq!(endpoint.path(), "streams");
/// ```
#[derive(Debug, Clone)]
pub struct Endpoint {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    cache_policy: CachePolicy,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            cache_policy: CachePolicy::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a request header. Validated when the request is built.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `body` as the JSON request body.
    ///
    /// Fails with [`NetError::Encoding`] if serialization fails.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self> {
        let encoded = encode_json(body)?;
        Ok(self.body(encoded))
    }

    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Resolve against `base`. See [`resolve_url()`].
    pub fn url(&self, base: Option<&Url>) -> Result<Url> {
        resolve_url(base, &self.path, &self.query)
    }
}

/// Resolve `path` (relative or absolute) plus `query` into a request URL.
///
/// Relative paths are appended to the base URL's path, so a base of
/// `https://api.example.com/v1` and path `streams` yield
/// `https://api.example.com/v1/streams`. The result must be `http` or
/// `https` with a host; anything else is [`NetError::InvalidUrl`].
pub fn resolve_url(base: Option<&Url>, path: &str, query: &[(String, String)]) -> Result<Url> {
    let mut url = match Url::parse(path) {
        Ok(absolute) => absolute,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| {
                NetError::InvalidUrl(format!("relative path '{path}' with no base URL"))
            })?;
            let mut base = base.clone();
            if !base.path().ends_with('/') {
                let with_slash = format!("{}/", base.path());
                base.set_path(&with_slash);
            }
            base.join(path.trim_start_matches('/'))
                .map_err(|e| NetError::InvalidUrl(format!("'{path}': {e}")))?
        }
        Err(e) => return Err(NetError::InvalidUrl(format!("'{path}': {e}"))),
    };

    if !matches!(url.scheme(), "http" | "https") {
        return Err(NetError::InvalidUrl(format!(
            "unsupported scheme '{}' in '{url}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(NetError::InvalidUrl(format!("'{url}' has no host")));
    }

    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(url)
}
