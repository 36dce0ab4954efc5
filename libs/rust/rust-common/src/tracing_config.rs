//! Tracing subscriber installation.
//!
//! Services call [`init_tracing`] once at startup; `RUST_LOG` overrides the
//! configured level when set.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::PlatformError;

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name for tracing
    pub service_name: String,
    /// Log level filter
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "rust-service".to_string(),
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Create config with custom service name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Create config with custom log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Toggle JSON output.
    #[must_use]
    pub const fn with_json_output(mut self, enabled: bool) -> Self {
        self.json_output = enabled;
        self
    }
}

/// Initialize tracing with the given configuration.
///
/// Installs the global subscriber. Should be called once at application startup.
///
/// # Errors
///
/// Returns [`PlatformError::Internal`] if a global subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), PlatformError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let result = if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| PlatformError::internal(e.to_string()))?;
    tracing::info!(service = %config.service_name, "Tracing initialized");
    Ok(())
}
