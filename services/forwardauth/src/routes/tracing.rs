//! Trace-id tagging endpoint.
//!
//! The proxy copies the `X-Trace-Id` response header onto the upstream request,
//! so untraced requests leave the edge with a fresh id and traced ones keep
//! theirs.

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::app::AppState;
use crate::error::ForwardAuthError;

/// Header carrying the trace id.
pub const X_TRACE_ID: &str = "x-trace-id";

/// Adds `X-Trace-Id` to the response when the request has none.
pub async fn set_trace_id(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ForwardAuthError> {
    if headers.contains_key(X_TRACE_ID) {
        return Ok(StatusCode::OK.into_response());
    }

    let id = state.trace_ids.generate()?;
    state.metrics.record_trace_id();
    debug!(trace_id = %id, "Generated trace id");

    let mut response = StatusCode::OK.into_response();
    response
        .headers_mut()
        .insert(X_TRACE_ID, HeaderValue::from(id.as_u64()));
    Ok(response)
}
