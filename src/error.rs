//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache layer and its HTTP surface.
///
/// Store operations never return the infrastructure variants to callers;
/// they are logged and converted to safe defaults inside the store. They
/// exist so backends and codecs can report what went wrong.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Remote backend could not be reached
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Remote backend answered with an error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Caller-supplied fetch function failed
    #[error("Fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),

    /// Caller-supplied fetch function did not finish in time
    #[error("Fetch timed out after {0}ms")]
    FetchTimeout(u64),

    /// Request rejected by the rate limiter
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            CacheError::BackendUnavailable(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Backend(_) | CacheError::Fetch(_) => StatusCode::BAD_GATEWAY,
            CacheError::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            CacheError::Serialization(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::NotFound("k".into()), StatusCode::NOT_FOUND),
            (CacheError::InvalidRequest("bad".into()), StatusCode::BAD_REQUEST),
            (CacheError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (CacheError::FetchTimeout(50), StatusCode::GATEWAY_TIMEOUT),
            (
                CacheError::Fetch(anyhow::anyhow!("db down")),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_fetch_error_keeps_source() {
        let err = CacheError::Fetch(anyhow::anyhow!("db down"));
        assert_eq!(err.to_string(), "Fetch failed: db down");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: std::result::Result<u64, _> = serde_json::from_str("not json");
        let err: CacheError = parse.unwrap_err().into();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
