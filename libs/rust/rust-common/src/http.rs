//! Centralized HTTP client configuration and building.
//!
//! Every outbound call made by the forward-auth services goes through a
//! client built here, so request and connect timeouts are always bounded.

use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::error::PlatformError;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
    /// Redirects followed before giving up; `0` returns 3xx responses as-is
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: "forwardauth-rust/1.0".to_string(),
            max_redirects: 10,
        }
    }
}

impl HttpConfig {
    /// Create a new HTTP config with custom timeout.
    ///
    /// The connect timeout is clamped so it never exceeds the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.connect_timeout = self.connect_timeout.min(timeout);
        self
    }

    /// Create a new HTTP config with custom connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Never follow redirects; the caller sees the 3xx response itself.
    #[must_use]
    pub const fn without_redirects(mut self) -> Self {
        self.max_redirects = 0;
        self
    }

    /// Create a new HTTP config with custom user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Build a configured HTTP client.
///
/// Creates a reqwest client with rustls TLS, connection pooling, and
/// the specified configuration.
///
/// # Errors
///
/// Returns [`PlatformError::Http`] if the client cannot be built
/// (e.g., TLS initialization fails).
///
/// # Examples
///
/// ```
/// use rust_common::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::default()
///     .with_timeout(Duration::from_secs(5));
/// let client = build_http_client(&config);
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, PlatformError> {
    let redirect = if config.max_redirects == 0 {
        Policy::none()
    } else {
        Policy::limited(config.max_redirects)
    };
    let client = ClientBuilder::new()
        .redirect(redirect)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .use_rustls_tls()
        .build()?;
    Ok(client)
}
