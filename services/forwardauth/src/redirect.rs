//! Response construction for access outcomes.
//!
//! The proxy cannot merge extra headers into the response it finally sends
//! the browser, so a refreshed identity cookie can only be delivered through a
//! redirect round-trip back to the original URL.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use url::Url;

use crate::error::ForwardAuthError;

/// Query parameter on the authorize URL carrying the URL to come back to.
pub const REDIRECT_URL_PARAM: &str = "redirect_url";

/// Body of a whitelist denial.
pub const NOT_PERMITTED_MESSAGE: &str = "User is not permitted to access this resource";

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Authenticated user is not on the whitelist
    NotListed,
    /// Whitelist enforcement requested but no whitelist supplied
    WhitelistMissing,
}

/// Terminal result of one access decision.
#[derive(Debug, Clone)]
pub enum AccessOutcome {
    /// Let the request through
    Allow,
    /// Refuse the request
    Deny(DenyReason),
    /// Send the browser to the provider's authorize page
    ProviderRedirect {
        /// Authorize URL including `redirect_url`
        location: Url,
    },
    /// Send the browser back to the original URL with a fresh identity cookie
    CookieRefreshRedirect {
        /// Original URL without `code`
        location: String,
        /// Cookie carrying the signed identity token
        cookie: Cookie<'static>,
    },
    /// OAuth endpoints are not configured
    ServerMisconfigured {
        /// Unset settings, for the operator log
        missing: Vec<&'static str>,
    },
}

impl AccessOutcome {
    /// Metrics label for this outcome.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny(DenyReason::NotListed) => "deny",
            Self::Deny(DenyReason::WhitelistMissing) => "whitelist_missing",
            Self::ProviderRedirect { .. } => "provider_redirect",
            Self::CookieRefreshRedirect { .. } => "cookie_refresh",
            Self::ServerMisconfigured { .. } => "misconfigured",
        }
    }
}

impl IntoResponse for AccessOutcome {
    fn into_response(self) -> Response {
        match self {
            Self::Allow => StatusCode::OK.into_response(),
            Self::Deny(DenyReason::NotListed) => {
                (StatusCode::UNAUTHORIZED, NOT_PERMITTED_MESSAGE).into_response()
            }
            Self::Deny(DenyReason::WhitelistMissing) => {
                ForwardAuthError::WhitelistConfig.into_response()
            }
            Self::ProviderRedirect { location } => {
                Redirect::temporary(location.as_str()).into_response()
            }
            Self::CookieRefreshRedirect { location, cookie } => {
                (CookieJar::new().add(cookie), Redirect::temporary(&location)).into_response()
            }
            Self::ServerMisconfigured { missing } => {
                ForwardAuthError::Configuration { missing }.into_response()
            }
        }
    }
}

/// Authorize URL with `redirect_url` set to `return_to`.
///
/// Existing query parameters of the configured URL are preserved.
#[must_use]
pub fn provider_redirect_url(authorize_url: &Url, return_to: &str) -> Url {
    let mut location = authorize_url.clone();
    location
        .query_pairs_mut()
        .append_pair(REDIRECT_URL_PARAM, return_to);
    location
}

/// Identity cookie set on the post-exchange redirect.
#[must_use]
pub fn identity_cookie(field: &str, token: String, same_site: SameSite) -> Cookie<'static> {
    Cookie::build((field.to_string(), token))
        .secure(true)
        .same_site(same_site)
        .path("/")
        .build()
}
