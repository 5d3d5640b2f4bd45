//! Credential provider seam.
//!
//! The client asks for a bearer token right before it builds each request's
//! headers. Token acquisition and refresh belong to the host application.

use async_trait::async_trait;

/// Supplies the bearer token attached to outgoing requests.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current token, or `None` to send the request unauthenticated.
    async fn bearer_token(&self) -> Option<String>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
