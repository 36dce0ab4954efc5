//! Forward-auth check for GitHub OAuth.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::app::AppState;
use crate::forwarded::ForwardedRequest;
use crate::query::AccessQuery;

/// Decides whether the forwarded request may proceed.
#[instrument(
    name = "authenticate",
    skip_all,
    fields(method = request.method(), host = request.host(), uri = request.uri())
)]
pub async fn github(
    State(state): State<AppState>,
    request: ForwardedRequest,
    query: AccessQuery,
    jar: CookieJar,
) -> Response {
    let token = jar.get(&query.cookie_field).map(|cookie| cookie.value().to_owned());

    match state
        .controller
        .decide(&request, &query, token.as_deref())
        .await
    {
        Ok(outcome) => {
            state.metrics.record_decision(outcome.label());
            outcome.into_response()
        }
        Err(err) => {
            state.metrics.record_decision("error");
            err.into_response()
        }
    }
}
