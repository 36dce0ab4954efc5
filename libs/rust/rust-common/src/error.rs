//! Centralized error types for all Rust libraries.
//!
//! This module provides a unified error type that can be used across the
//! forward-auth Rust services.

use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP client could not be built or a request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Create an internal error with the given message.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlatformError::internal("subscriber already installed");
        assert_eq!(err.to_string(), "Internal error: subscriber already installed");
    }
}
