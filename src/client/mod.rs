//! Request execution and orchestration.
//!
//! [`ApiClient`] is the public entry point. It validates the URL, consults
//! connectivity and the per-host rate limiter, attaches credentials, and
//! hands the request to a [`RequestExecutor`], which performs the HTTP
//! exchange through a [`Transport`] and retries transient failures.

mod api;
mod builder;
mod counters;
mod credentials;
mod endpoint;
mod executor;
mod retry;
mod transport;

pub use api::{ApiClient, response_cache_key};
pub use builder::ApiClientBuilder;
pub use counters::{RequestCounters, RequestMetrics};
pub use credentials::{CredentialProvider, StaticToken};
pub use endpoint::{CachePolicy, Endpoint, resolve_url};
pub use executor::{RequestExecutor, classify, decode_json, encode_json};
pub use retry::{MIN_RETRY_DELAY, RetryConfig};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, TimeoutConfig, Transport};
