//! streamyyy-net - network resilience and caching for the Streamyyy client
//!
//! Every request to the Streamyyy backend or a streaming platform goes
//! through [`ApiClient`], which fails fast while offline, keeps each host
//! inside its published rate limit, retries transient failures with
//! exponential backoff, and can serve or store responses through a
//! two-tier [`PersistentCache`] that survives restarts.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use serde::Deserialize;
//! use streamyyy_net::{ApiClient, CacheConfig, CachePolicy, ConnectivityMonitor, Endpoint, PersistentCache};
//!
//! #[derive(Deserialize)]
//! struct Stream {
//!     id: String,
//!     title: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> streamyyy_net::Result<()> {
//!     let connectivity = Arc::new(ConnectivityMonitor::assume_online());
//!     let cache = Arc::new(PersistentCache::open(CacheConfig::default()).await?);
//!     let _sweeper = cache.spawn_sweeper();
//!
//!     let client = ApiClient::builder()
//!         .base_url("https://api.streamyyy.com/v1")
//!         .connectivity(connectivity.clone())
//!         .cache(cache)
//!         .build()?;
//!
//!     let streams: Vec<Stream> = client
//!         .request(
//!             &Endpoint::get("streams/top")
//!                 .query("first", "20")
//!                 .cache_policy(CachePolicy::CacheFirst { ttl: Duration::from_secs(60) }),
//!         )
//!         .await?;
//!
//!     for stream in &streams {
//!         println!("{}: {}", stream.id, stream.title);
//!     }
//!     println!("{:?}", client.metrics().await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod limiter;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheStats, PersistentCache, SweeperHandle};
pub use client::{
    ApiClient, ApiClientBuilder, CachePolicy, CredentialProvider, Endpoint, HttpRequest,
    HttpResponse, ReqwestTransport, RequestExecutor, RequestMetrics, RetryConfig, StaticToken,
    TimeoutConfig, Transport,
};
pub use config::{Config, Secrets};
pub use connectivity::{
    ConnectionQuality, ConnectivityMonitor, ConnectivityState, InterfaceType, PathStatus,
    PathUpdate,
};
pub use error::{NetError, NetworkFailure, Result};
pub use limiter::{RateLimiter, RateLimiterRegistry, RateQuota};
pub use version::{PKG_VERSION, version_string};
