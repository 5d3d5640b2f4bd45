//! Single-request execution with bounded retries.
//!
//! [`RequestExecutor`] sends one [`HttpRequest`] through a [`Transport`],
//! maps the status code onto [`NetError`], and retries transient outcomes.
//! It does not check connectivity or rate limits and does not touch the
//! client's request counters; the [`ApiClient`](crate::ApiClient) does both.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::retry::{RetryConfig, with_retry};
use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::{NetError, Result};

/// Sends requests and classifies their outcome.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryConfig) -> Self {
        Self { transport, retry }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send with the configured retry budget and return the body bytes.
    pub async fn execute(&self, request: &HttpRequest) -> Result<Bytes> {
        self.execute_with_retries(request, self.retry.max_retries).await
    }

    /// Send with an explicit retry budget: at most `retries + 1` attempts.
    pub async fn execute_with_retries(&self, request: &HttpRequest, retries: u32) -> Result<Bytes> {
        let host = request.url.host_str().unwrap_or_default();
        let transport = &self.transport;
        with_retry(&self.retry, retries, host, move || async move {
            let response = transport.send(request).await?;
            debug!(
                method = %request.method,
                url = %request.url,
                status = response.status,
                "response received"
            );
            classify(response)
        })
        .await
    }

    /// Send and decode the JSON body into `T`.
    ///
    /// Decoding failures are [`NetError::Decoding`] and never retried.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &HttpRequest,
        retries: u32,
    ) -> Result<T> {
        let body = self.execute_with_retries(request, retries).await?;
        decode_json(&body)
    }
}

/// Map a response onto its body or a classified error.
pub fn classify(response: HttpResponse) -> Result<Bytes> {
    match NetError::from_status(response.status) {
        None => Ok(response.body),
        Some(err) => Err(err),
    }
}

/// Decode a JSON body.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| NetError::Decoding(e.to_string()))
}

/// Encode a JSON request body.
pub fn encode_json<B: Serialize + ?Sized>(body: &B) -> Result<Bytes> {
    serde_json::to_vec(body)
        .map(Bytes::from)
        .map_err(|e| NetError::Encoding(e.to_string()))
}
