//! Error handling module with type-safe, non-exhaustive error types
//!
//! Every locally resolvable failure becomes an HTTP response at the boundary.
//! Configuration and internal failures answer with a generic message; only
//! upstream provider errors are passed through verbatim.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rust_common::PlatformError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::snowflake::SnowflakeError;

/// Body returned when the OAuth endpoints are not configured.
pub const MISCONFIGURED_MESSAGE: &str =
    "Forward-auth middleware is not configured, please contact the administrator";

/// Body returned when a whitelist is required but none was supplied.
pub const WHITELIST_MISSING_MESSAGE: &str =
    "Access whitelist is not configured, please contact the administrator";

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ForwardAuthError {
    /// A forwarded header the proxy must always send is absent
    #[error("Missing forwarded header: {header}")]
    MissingHeader {
        /// Header name
        header: &'static str,
    },

    /// A forwarded header is present but not valid visible ASCII
    #[error("Malformed forwarded header: {header}")]
    MalformedHeader {
        /// Header name
        header: &'static str,
    },

    /// A query parameter of the auth request could not be interpreted
    #[error("Invalid query parameter {param}: {reason}")]
    InvalidQuery {
        /// Parameter name
        param: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// OAuth endpoints are not configured
    #[error("OAuth endpoints not configured: {missing:?}")]
    Configuration {
        /// Names of the unset settings
        missing: Vec<&'static str>,
    },

    /// Whitelist enforcement requested without a whitelist
    #[error("Whitelist required but not supplied")]
    WhitelistConfig,

    /// Cookie token is missing, forged, or undecodable
    #[error("Invalid credential: {reason}")]
    InvalidCredential {
        /// Description of the failure
        reason: String,
    },

    /// Provider answered the code exchange with a non-2xx status
    #[error("Upstream exchange failed with status {status}")]
    UpstreamExchange {
        /// Upstream status code
        status: StatusCode,
        /// Upstream body, passed through unchanged
        body: String,
    },

    /// Code exchange exceeded its time budget
    #[error("Code exchange timed out after {duration:?}")]
    ExchangeTimeout {
        /// Configured bound
        duration: Duration,
    },

    /// Code exchange failed below HTTP (connect, TLS, body read)
    #[error("Code exchange transport error: {0}")]
    ExchangeTransport(#[source] reqwest::Error),

    /// Provider answered 2xx but the payload is unusable
    #[error("Malformed userinfo payload: {reason}")]
    MalformedUserinfo {
        /// Description of the problem
        reason: String,
    },

    /// Identity token could not be signed
    #[error("Token signing failed: {0}")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),

    /// Trace id generation failed
    #[error(transparent)]
    TraceId(#[from] SnowflakeError),

    /// Service configuration rejected at startup
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Shared platform failure
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// Internal error (details never exposed in responses)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Stable error codes, used in logs and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Forwarded header absent or malformed
    BadForwardedRequest,
    /// Query parameter rejected
    InvalidQuery,
    /// OAuth endpoints unset
    Misconfigured,
    /// Whitelist required but absent
    WhitelistMissing,
    /// Credential rejected
    InvalidCredential,
    /// Provider returned an error status
    UpstreamError,
    /// Provider did not answer in time
    UpstreamTimeout,
    /// Provider unreachable or answered garbage
    UpstreamUnavailable,
    /// Trace id clock regression
    ClockRegression,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BadForwardedRequest => "BAD_FORWARDED_REQUEST",
            Self::InvalidQuery => "INVALID_QUERY",
            Self::Misconfigured => "MIDDLEWARE_MISCONFIGURED",
            Self::WhitelistMissing => "WHITELIST_MISSING",
            Self::InvalidCredential => "AUTH_CREDENTIAL_INVALID",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::ClockRegression => "CLOCK_REGRESSION",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl ForwardAuthError {
    /// Get the error code for this error
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingHeader { .. } | Self::MalformedHeader { .. } => {
                ErrorCode::BadForwardedRequest
            }
            Self::InvalidQuery { .. } => ErrorCode::InvalidQuery,
            Self::Configuration { .. } => ErrorCode::Misconfigured,
            Self::WhitelistConfig => ErrorCode::WhitelistMissing,
            Self::InvalidCredential { .. } => ErrorCode::InvalidCredential,
            Self::UpstreamExchange { .. } => ErrorCode::UpstreamError,
            Self::ExchangeTimeout { .. } => ErrorCode::UpstreamTimeout,
            Self::ExchangeTransport(_) | Self::MalformedUserinfo { .. } => {
                ErrorCode::UpstreamUnavailable
            }
            Self::TraceId(SnowflakeError::ClockRegression { .. }) => ErrorCode::ClockRegression,
            Self::TokenSigning(_)
            | Self::TraceId(_)
            | Self::Config(_)
            | Self::Platform(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status this error is rendered with
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingHeader { .. } | Self::MalformedHeader { .. } | Self::InvalidQuery { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::WhitelistConfig | Self::InvalidCredential { .. } => StatusCode::UNAUTHORIZED,
            Self::UpstreamExchange { status, .. } => *status,
            Self::ExchangeTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::ExchangeTransport(_) | Self::MalformedUserinfo { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration { .. }
            | Self::TokenSigning(_)
            | Self::TraceId(_)
            | Self::Config(_)
            | Self::Platform(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body shown to the caller. Never carries internal details.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingHeader { header } => format!("Missing required header {header}"),
            Self::MalformedHeader { header } => format!("Malformed header {header}"),
            Self::InvalidQuery { param, .. } => format!("Invalid query parameter {param}"),
            Self::Configuration { .. } => MISCONFIGURED_MESSAGE.to_string(),
            Self::WhitelistConfig => WHITELIST_MISSING_MESSAGE.to_string(),
            Self::InvalidCredential { .. } => "Invalid credential".to_string(),
            Self::UpstreamExchange { body, .. } => body.clone(),
            Self::ExchangeTimeout { .. } => "Authorization provider timed out".to_string(),
            Self::ExchangeTransport(_) | Self::MalformedUserinfo { .. } => {
                "Authorization provider unavailable".to_string()
            }
            Self::TokenSigning(_)
            | Self::TraceId(_)
            | Self::Config(_)
            | Self::Platform(_)
            | Self::Internal(_) => "Internal error".to_string(),
        }
    }

    /// Map a reqwest failure from the code exchange
    pub(crate) fn from_exchange(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::ExchangeTimeout { duration: timeout }
        } else if err.is_decode() {
            Self::MalformedUserinfo {
                reason: err.to_string(),
            }
        } else {
            Self::ExchangeTransport(err)
        }
    }
}

impl IntoResponse for ForwardAuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, error_code = self.code().as_str(), "Request failed");
        } else {
            tracing::warn!(error = %self, error_code = self.code().as_str(), "Request rejected");
        }
        (status, self.public_message()).into_response()
    }
}
