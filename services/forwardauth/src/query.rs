//! Per-request access options carried in the auth endpoint's query string.
//!
//! The proxy configuration decides these per route, e.g.
//! `/authentication/github?whitelist=alice&whitelist=bob&samesite=lax`.
//! `whitelist` may repeat, which is why this is parsed with
//! `form_urlencoded` rather than a `serde` query struct.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::SameSite;
use url::form_urlencoded;

use crate::error::ForwardAuthError;

/// Cookie holding the identity token when `auth_cookie_field` is not given.
pub const DEFAULT_COOKIE_FIELD: &str = "github_oauth_sig";

/// Options controlling one access decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessQuery {
    /// Enforce the whitelist (default `true`)
    pub use_whitelist: bool,
    /// Permitted usernames; `None` when no `whitelist` parameter was sent
    pub whitelist: Option<Vec<String>>,
    /// Cookie the identity token is read from and written to
    pub cookie_field: String,
    /// `SameSite` attribute of the refreshed cookie
    pub same_site: SameSite,
}

impl Default for AccessQuery {
    fn default() -> Self {
        Self {
            use_whitelist: true,
            whitelist: None,
            cookie_field: DEFAULT_COOKIE_FIELD.to_string(),
            same_site: SameSite::None,
        }
    }
}

impl AccessQuery {
    /// Parses the raw query string of the auth request.
    pub fn parse(query: Option<&str>) -> Result<Self, ForwardAuthError> {
        let mut parsed = Self::default();
        let Some(query) = query else {
            return Ok(parsed);
        };

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "use_whitelist" => parsed.use_whitelist = parse_bool(&value)?,
                "whitelist" => parsed
                    .whitelist
                    .get_or_insert_with(Vec::new)
                    .push(value.into_owned()),
                "auth_cookie_field" => {
                    if value.is_empty() {
                        return Err(ForwardAuthError::InvalidQuery {
                            param: "auth_cookie_field",
                            reason: "cookie name must not be empty".to_string(),
                        });
                    }
                    parsed.cookie_field = value.into_owned();
                }
                "samesite" => parsed.same_site = parse_same_site(&value)?,
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// Whitelist to enforce, or `Ok(None)` when enforcement is disabled.
    pub fn enforced_whitelist(&self) -> Result<Option<&[String]>, ForwardAuthError> {
        if !self.use_whitelist {
            return Ok(None);
        }
        self.whitelist
            .as_deref()
            .map(Some)
            .ok_or(ForwardAuthError::WhitelistConfig)
    }
}

impl<S> FromRequestParts<S> for AccessQuery
where
    S: Send + Sync,
{
    type Rejection = ForwardAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::parse(parts.uri.query())
    }
}

fn parse_bool(value: &str) -> Result<bool, ForwardAuthError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ForwardAuthError::InvalidQuery {
            param: "use_whitelist",
            reason: format!("{other:?} is not a boolean"),
        }),
    }
}

fn parse_same_site(value: &str) -> Result<SameSite, ForwardAuthError> {
    match value.to_ascii_lowercase().as_str() {
        "none" => Ok(SameSite::None),
        "lax" => Ok(SameSite::Lax),
        "strict" => Ok(SameSite::Strict),
        other => Err(ForwardAuthError::InvalidQuery {
            param: "samesite",
            reason: format!("{other:?} is not one of none, lax, strict"),
        }),
    }
}
