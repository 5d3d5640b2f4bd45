use std::io;

use streamyyy_net::{NetError, NetworkFailure, Result};
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_error_display() {
    assert_eq!(NetError::ServerError(503).to_string(), "server error (503)");
    assert_eq!(
        NetError::offline().to_string(),
        "network error: offline"
    );
    assert!(
        NetError::InvalidUrl("'::'".into())
            .to_string()
            .contains("'::'")
    );
    assert_eq!(
        NetError::Unknown(None).to_string(),
        "unexpected response (status none)"
    );
    assert_eq!(
        NetError::Unknown(Some(302)).to_string(),
        "unexpected response (status 302)"
    );
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(NetError::RateLimited)
    }
    fn returns_ok() -> Result<u8> {
        Ok(1)
    }
    assert_err!(returns_error());
    assert_ok!(returns_ok());
}

#[test]
fn io_errors_convert() {
    let err: NetError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
    assert!(matches!(err, NetError::Io(ref msg) if msg.contains("denied")));
}

// ============================================================================
// Status mapping
// ============================================================================

#[test]
fn success_statuses_map_to_none() {
    for status in [200, 201, 204, 299] {
        assert!(NetError::from_status(status).is_none(), "{status}");
    }
}

#[test]
fn error_statuses_map_to_classes() {
    assert!(matches!(NetError::from_status(401), Some(NetError::Unauthorized)));
    assert!(matches!(NetError::from_status(404), Some(NetError::NotFound)));
    assert!(matches!(NetError::from_status(429), Some(NetError::RateLimited)));
    assert!(matches!(NetError::from_status(500), Some(NetError::ServerError(500))));
    assert!(matches!(NetError::from_status(599), Some(NetError::ServerError(599))));
    assert!(matches!(NetError::from_status(403), Some(NetError::Unknown(Some(403)))));
    assert!(matches!(NetError::from_status(304), Some(NetError::Unknown(Some(304)))));
}

// ============================================================================
// Classification
// ============================================================================

#[test]
fn transient_errors() {
    assert!(NetError::offline().is_transient());
    assert!(NetError::Network(NetworkFailure::Timeout).is_transient());
    assert!(NetError::Network(NetworkFailure::Transport("reset".into())).is_transient());
    assert!(NetError::ServerError(500).is_transient());
    assert!(NetError::ServerError(503).is_transient());
}

#[test]
fn permanent_errors() {
    assert!(!NetError::RateLimited.is_transient());
    assert!(!NetError::Unauthorized.is_transient());
    assert!(!NetError::NotFound.is_transient());
    assert!(!NetError::Unknown(Some(418)).is_transient());
    assert!(!NetError::Decoding("bad".into()).is_transient());
    assert!(!NetError::Encoding("bad".into()).is_transient());
    assert!(!NetError::InvalidUrl("x".into()).is_transient());
}

#[test]
fn user_retryable_errors() {
    assert!(NetError::RateLimited.is_retryable_by_user());
    assert!(NetError::offline().is_retryable_by_user());
    assert!(NetError::ServerError(502).is_retryable_by_user());
    assert!(!NetError::Unauthorized.is_retryable_by_user());
    assert!(!NetError::NotFound.is_retryable_by_user());
    assert!(!NetError::Decoding("bad".into()).is_retryable_by_user());
}

#[test]
fn kinds_are_stable_labels() {
    assert_eq!(NetError::offline().kind(), "offline");
    assert_eq!(NetError::Network(NetworkFailure::Timeout).kind(), "timeout");
    assert_eq!(NetError::RateLimited.kind(), "rate_limited");
    assert_eq!(NetError::ServerError(500).kind(), "server_error");
    assert_eq!(NetError::Unknown(None).kind(), "unknown");
}
