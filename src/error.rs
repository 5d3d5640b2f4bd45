//! streamyyy-net error types

use std::fmt;

/// Why a request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The connectivity monitor reports no usable network path.
    Offline,
    /// The request or resource timeout elapsed.
    Timeout,
    /// Any other transport failure (DNS, TLS, connection reset, ...).
    Transport(String),
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkFailure::Offline => f.write_str("offline"),
            NetworkFailure::Timeout => f.write_str("timed out"),
            NetworkFailure::Transport(msg) => f.write_str(msg),
        }
    }
}

/// streamyyy-net error types
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    // Request construction
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    // Transport / upstream outcomes
    #[error("network error: {0}")]
    Network(NetworkFailure),

    #[error("rate limited")]
    RateLimited,

    #[error("unauthorized")]
    Unauthorized,

    #[error("resource not found")]
    NotFound,

    #[error("server error ({0})")]
    ServerError(u16),

    #[error("unexpected response (status {})", describe_status(.0))]
    Unknown(Option<u16>),

    // Payload contract errors
    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    // Setup errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl NetError {
    /// Shorthand for the offline fast-fail outcome.
    pub fn offline() -> Self {
        NetError::Network(NetworkFailure::Offline)
    }

    /// Map an HTTP status code to its error class.
    ///
    /// Returns `None` for 2xx statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(NetError::Unauthorized),
            404 => Some(NetError::NotFound),
            429 => Some(NetError::RateLimited),
            500..=599 => Some(NetError::ServerError(status)),
            other => Some(NetError::Unknown(Some(other))),
        }
    }

    /// Whether the executor may retry this outcome with the same request.
    ///
    /// Only transport failures and 5xx responses qualify. `RateLimited` is
    /// excluded: retrying immediately would deepen the throttling.
    pub fn is_transient(&self) -> bool {
        matches!(self, NetError::Network(_) | NetError::ServerError(_))
    }

    /// Whether a user-facing retry affordance makes sense for this error.
    pub fn is_retryable_by_user(&self) -> bool {
        matches!(
            self,
            NetError::Network(_) | NetError::RateLimited | NetError::ServerError(_)
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            NetError::InvalidUrl(_) => "invalid_url",
            NetError::Network(NetworkFailure::Offline) => "offline",
            NetError::Network(NetworkFailure::Timeout) => "timeout",
            NetError::Network(NetworkFailure::Transport(_)) => "network",
            NetError::RateLimited => "rate_limited",
            NetError::Unauthorized => "unauthorized",
            NetError::NotFound => "not_found",
            NetError::ServerError(_) => "server_error",
            NetError::Unknown(_) => "unknown",
            NetError::Decoding(_) => "decoding",
            NetError::Encoding(_) => "encoding",
            NetError::Configuration(_) => "configuration",
            NetError::Io(_) => "io",
        }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |code| code.to_string())
}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        NetError::Io(err.to_string())
    }
}

/// Result type alias for streamyyy-net operations
pub type Result<T> = std::result::Result<T, NetError>;
