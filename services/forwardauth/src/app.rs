//! Application state and router assembly.

use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::config::Config;
use crate::decision::AccessController;
use crate::error::ForwardAuthError;
use crate::jwt::TokenCodec;
use crate::middleware::TracingLayer;
use crate::oauth::{CodeExchanger, HttpCodeExchanger};
use crate::observability::ForwardAuthMetrics;
use crate::routes::{self, AUTHENTICATION_PATH, SET_TRACE_ID_PATH};
use crate::snowflake::Snowflake;

/// Name reported in spans and the outbound user agent.
pub const SERVICE_NAME: &str = "forwardauth-service";

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Access decision engine
    pub controller: AccessController,
    /// Trace-id generator owned by this process
    pub trace_ids: Arc<Snowflake>,
    /// Prometheus metrics
    pub metrics: ForwardAuthMetrics,
}

impl AppState {
    /// Builds the state from configuration, using the HTTP exchanger when a
    /// userinfo endpoint is configured.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the HTTP client, metrics
    /// registry or generator cannot be built.
    pub fn from_config(config: Config) -> Result<Self, ForwardAuthError> {
        config.validate()?;
        let exchanger = config
            .github_oauth_userinfo_endpoint
            .clone()
            .map(|endpoint| HttpCodeExchanger::new(endpoint, config.exchange_timeout()))
            .transpose()?
            .map(|exchanger| Arc::new(exchanger) as Arc<dyn CodeExchanger>);
        Self::with_exchanger(config, exchanger)
    }

    /// Builds the state around an explicit exchanger.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the metrics registry or
    /// generator cannot be built.
    pub fn with_exchanger(
        config: Config,
        exchanger: Option<Arc<dyn CodeExchanger>>,
    ) -> Result<Self, ForwardAuthError> {
        config.validate()?;
        let metrics =
            ForwardAuthMetrics::new().map_err(|e| ForwardAuthError::Internal(e.into()))?;
        let codec = Arc::new(TokenCodec::new(config.jwt_secret.as_bytes()));
        let trace_ids = Arc::new(Snowflake::new(config.snowflake_worker_id)?);
        let controller = AccessController::new(
            codec,
            config.github_oauth_authorize_url.clone(),
            exchanger,
            metrics.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            controller,
            trace_ids,
            metrics,
        })
    }
}

/// Builds the service router.
///
/// The auth and tracing routes are mounted under `route_prefix`; `/health` and
/// `/metrics` always live at the root.
pub fn router(state: AppState) -> Router {
    let request_timeout = state.config.request_timeout();
    let prefix = state.config.route_prefix.clone();

    let gateway = Router::new()
        .route(AUTHENTICATION_PATH, any(routes::authentication::github))
        .route(SET_TRACE_ID_PATH, any(routes::tracing::set_trace_id));

    let gateway = if prefix.is_empty() {
        gateway
    } else {
        info!(prefix = %prefix, "Mounting gateway routes under prefix");
        Router::new().nest(&prefix, gateway)
    };

    gateway
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TracingLayer::new(SERVICE_NAME))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(state)
}
