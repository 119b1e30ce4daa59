//! Error types for the classifier.

use thiserror::Error;

/// Errors that can occur during classification.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// AI model not configured
    #[error("AI classifier not configured")]
    NotConfigured,

    /// AI request failed
    #[error("AI request failed: {0}")]
    RequestFailed(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimited,

    /// AI returned JSON we cannot accept
    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),

    /// Override or cache file problem
    #[error("Classification source file error: {0}")]
    SourceFile(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClassifierError {
    /// Whether the hierarchy should fall through to the next step.
    ///
    /// Everything except database failures falls through; a ride still gets
    /// the pattern result or the tier-2 default.
    #[must_use]
    pub const fn should_fallback(&self) -> bool {
        !matches!(self, Self::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_failures_fall_through() {
        assert!(ClassifierError::NotConfigured.should_fallback());
        assert!(ClassifierError::RateLimited.should_fallback());
        assert!(ClassifierError::InvalidResponse("bad tier".into()).should_fallback());
    }

    #[test]
    fn test_database_errors_do_not_fall_through() {
        assert!(!ClassifierError::Database(sqlx::Error::PoolClosed).should_fallback());
    }
}
