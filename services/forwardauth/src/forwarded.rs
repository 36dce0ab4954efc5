//! Forwarded-request extraction.
//!
//! The reverse proxy describes the original request through five
//! `X-Forwarded-*` headers. All five are mandatory; a missing one is a proxy
//! misconfiguration and rejects the call before any auth logic runs.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use url::form_urlencoded;

use crate::error::ForwardAuthError;

/// Original request method.
pub const X_FORWARDED_METHOD: &str = "x-forwarded-method";
/// Original request scheme.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
/// Original request host.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
/// Original request path and query.
pub const X_FORWARDED_URI: &str = "x-forwarded-uri";
/// Original client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Query parameter carrying the OAuth authorization code.
pub const CODE_PARAM: &str = "code";

/// Canonical description of the request the proxy is asking about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRequest {
    method: String,
    protocol: String,
    host: String,
    uri: String,
    client_ip: String,
}

impl ForwardedRequest {
    /// Builds the descriptor from proxy headers.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ForwardAuthError> {
        Ok(Self {
            method: required_header(headers, X_FORWARDED_METHOD)?,
            protocol: required_header(headers, X_FORWARDED_PROTO)?,
            host: required_header(headers, X_FORWARDED_HOST)?,
            uri: required_header(headers, X_FORWARDED_URI)?,
            client_ip: required_header(headers, X_FORWARDED_FOR)?,
        })
    }

    /// Original request method as sent by the proxy.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Original scheme, e.g. `https`.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Original host, including any port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Original path plus query string.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Client address chain as forwarded.
    #[must_use]
    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// CORS preflight requests bypass authentication.
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        self.method.eq_ignore_ascii_case("OPTIONS")
    }

    /// `{protocol}://{host}{uri}` exactly as the client requested it.
    #[must_use]
    pub fn original_url(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.uri)
    }

    /// First `code` query parameter of the original URI.
    #[must_use]
    pub fn authorization_code(&self) -> Option<String> {
        let (_, query) = split_uri(&self.uri);
        form_urlencoded::parse(query?.as_bytes())
            .find(|(key, value)| key == CODE_PARAM && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    }

    /// Original URL with every `code` parameter and any fragment removed.
    #[must_use]
    pub fn url_without_code(&self) -> String {
        let (path, query) = split_uri(&self.uri);
        let remaining = query
            .map(|q| {
                let mut serializer = form_urlencoded::Serializer::new(String::new());
                serializer.extend_pairs(
                    form_urlencoded::parse(q.as_bytes()).filter(|(key, _)| key != CODE_PARAM),
                );
                serializer.finish()
            })
            .unwrap_or_default();

        if remaining.is_empty() {
            format!("{}://{}{}", self.protocol, self.host, path)
        } else {
            format!("{}://{}{}?{}", self.protocol, self.host, path, remaining)
        }
    }
}

impl<S> FromRequestParts<S> for ForwardedRequest
where
    S: Send + Sync,
{
    type Rejection = ForwardAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String, ForwardAuthError> {
    let value = headers
        .get(name)
        .ok_or(ForwardAuthError::MissingHeader { header: name })?;
    value
        .to_str()
        .map(str::to_owned)
        .map_err(|_| ForwardAuthError::MalformedHeader { header: name })
}

/// Splits `path?query#fragment` into path and query, discarding the fragment.
fn split_uri(uri: &str) -> (&str, Option<&str>) {
    let without_fragment = uri.split_once('#').map_or(uri, |(head, _)| head);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    }
}
