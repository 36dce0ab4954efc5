//! Type-Safe Configuration with Validation
//!
//! Provides type-safe configuration with URL validation and environment variable support.

use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::snowflake::MAX_WORKER_ID;

/// Secret used when `JWT_SECRET` is not set. Only suitable for local development.
pub const DEFAULT_JWT_SECRET: &str = "secret";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable name
        field: String,
        /// Parse failure
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid timeout value
    #[error("Invalid timeout for {0}: must be greater than 0")]
    InvalidTimeout(&'static str),

    /// Exchange would outlive the request it runs in
    #[error("EXCHANGE_TIMEOUT ({exchange}s) must be shorter than REQUEST_TIMEOUT ({request}s)")]
    ExchangeTimeoutTooLong {
        /// Exchange bound in seconds
        exchange: u64,
        /// Request bound in seconds
        request: u64,
    },

    /// Worker id does not fit in the trace-id layout
    #[error("Invalid worker id {0}: must be at most 1023")]
    InvalidWorkerId(u16),

    /// Route prefix must be empty or an absolute path without trailing slash
    #[error("Invalid route prefix {0:?}: must start with '/' and not end with '/'")]
    InvalidRoutePrefix(String),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parse failure
        reason: String,
    },
}

/// Service configuration with validation.
#[derive(Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Prefix the auth and tracing routes are mounted under (e.g. `/traefik/forwardauth`)
    pub route_prefix: String,
    /// Shared HMAC secret for identity tokens
    pub jwt_secret: String,
    /// OAuth provider page users are sent to when unauthenticated
    pub github_oauth_authorize_url: Option<Url>,
    /// Endpoint exchanging an authorization code for user info
    pub github_oauth_userinfo_endpoint: Option<Url>,
    /// Bound on the outbound code exchange, in seconds
    pub exchange_timeout_secs: u64,
    /// Bound on a whole inbound request, in seconds
    pub request_timeout_secs: u64,
    /// Worker id embedded in generated trace ids
    pub snowflake_worker_id: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("route_prefix", &self.route_prefix)
            .field("jwt_secret", &"<redacted>")
            .field("github_oauth_authorize_url", &self.github_oauth_authorize_url)
            .field("github_oauth_userinfo_endpoint", &self.github_oauth_userinfo_endpoint)
            .field("exchange_timeout_secs", &self.exchange_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("snowflake_worker_id", &self.snowflake_worker_id)
            .field("shutdown_timeout_seconds", &self.shutdown_timeout_seconds)
            .field("log_level", &self.log_level)
            .field("log_json", &self.log_json)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            route_prefix: String::new(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            github_oauth_authorize_url: None,
            github_oauth_userinfo_endpoint: None,
            exchange_timeout_secs: 10,
            request_timeout_secs: 30,
            snowflake_worker_id: 0,
            shutdown_timeout_seconds: 30,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT", defaults.port)?,
            route_prefix: env::var("ROUTE_PREFIX").unwrap_or(defaults.route_prefix),
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            github_oauth_authorize_url: parse_optional_url_env("GITHUB_OAUTH_AUTHORIZE_URL")?,
            github_oauth_userinfo_endpoint: parse_optional_url_env(
                "GITHUB_OAUTH_USERINFO_ENDPOINT",
            )?,
            exchange_timeout_secs: parse_env("EXCHANGE_TIMEOUT", defaults.exchange_timeout_secs)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT", defaults.request_timeout_secs)?,
            snowflake_worker_id: parse_env("SNOWFLAKE_WORKER_ID", defaults.snowflake_worker_id)?,
            shutdown_timeout_seconds: parse_env(
                "SHUTDOWN_TIMEOUT",
                defaults.shutdown_timeout_seconds,
            )?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: parse_env("LOG_JSON", defaults.log_json)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt_secret".to_string()));
        }
        if self.exchange_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("EXCHANGE_TIMEOUT"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("REQUEST_TIMEOUT"));
        }
        if self.exchange_timeout_secs >= self.request_timeout_secs {
            return Err(ConfigError::ExchangeTimeoutTooLong {
                exchange: self.exchange_timeout_secs,
                request: self.request_timeout_secs,
            });
        }
        if self.snowflake_worker_id > MAX_WORKER_ID {
            return Err(ConfigError::InvalidWorkerId(self.snowflake_worker_id));
        }
        if !self.route_prefix.is_empty()
            && (!self.route_prefix.starts_with('/') || self.route_prefix.ends_with('/'))
        {
            return Err(ConfigError::InvalidRoutePrefix(self.route_prefix.clone()));
        }
        Ok(())
    }

    /// Whether the development default secret is still in use.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    /// Gets the exchange timeout as a duration.
    #[must_use]
    pub const fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    /// Gets the whole-request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Gets the graceful shutdown timeout as a duration.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    /// Socket address string the server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse an optional URL environment variable. Unset or blank means "not configured".
fn parse_optional_url_env(name: &str) -> Result<Option<Url>, ConfigError> {
    match env::var(name) {
        Ok(val) if !val.trim().is_empty() => parse_url(name, val.trim()).map(Some),
        _ => Ok(None),
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}
