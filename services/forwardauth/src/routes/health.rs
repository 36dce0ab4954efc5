//! Liveness and metrics exposition.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::app::AppState;
use crate::error::ForwardAuthError;

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ForwardAuthError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ForwardAuthError::Internal(e.into()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    )
        .into_response())
}
