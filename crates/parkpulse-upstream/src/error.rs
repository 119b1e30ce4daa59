//! Upstream API error types.
//!
//! Domain-specific error types shared by both source adapters.

use reqwest::StatusCode;
use thiserror::Error;

/// Upstream API errors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Generic API error with status code.
    #[error("API error (HTTP {status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: StatusCode,
        /// Response body.
        body: String,
    },

    /// Network or connection error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON or payload parsing error. Recoverable per record.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Gzip decompression failure. Fails the whole file.
    #[error("Failed to decompress archive object: {0}")]
    Decompression(String),
}

impl UpstreamError {
    /// Check if the error is retryable.
    ///
    /// Returns `true` for rate limiting, network errors, and server errors (5xx).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Network(_) => true,
            Self::ApiError { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Quality-log issue type for this error.
    #[must_use]
    pub const fn issue_type(&self) -> &'static str {
        match self {
            Self::Parse(_) | Self::Decompression(_) => "PARSE_ERROR",
            _ => "TRANSPORT_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_retryable() {
        assert!(UpstreamError::RateLimited.is_retryable());
    }

    #[test]
    fn test_server_error_is_retryable() {
        let err = UpstreamError::ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "Internal error".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_error_not_retryable() {
        let err = UpstreamError::ApiError {
            status: StatusCode::BAD_REQUEST,
            body: "Bad request".to_string(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_error_not_retryable() {
        assert!(!UpstreamError::Parse("bad json".into()).is_retryable());
        assert_eq!(
            UpstreamError::Parse("bad json".into()).issue_type(),
            "PARSE_ERROR"
        );
    }

    #[test]
    fn test_decompression_is_parse_issue() {
        let err = UpstreamError::Decompression("corrupt gzip".into());
        assert!(!err.is_retryable());
        assert_eq!(err.issue_type(), "PARSE_ERROR");
    }
}
