//! Userinfo exchange client.
//!
//! The provider side is a small service that accepts the one-time code
//! returned by the OAuth authorize step and answers with the user's profile as
//! a JSON object containing at least `username`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_common::{HttpConfig, build_http_client};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::ForwardAuthError;
use crate::forwarded::CODE_PARAM;
use crate::jwt::IdentityClaims;

/// Exchanges an authorization code for a verified identity.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    /// Performs one exchange. Never retried: codes are single-use.
    async fn exchange(&self, code: &str) -> Result<IdentityClaims, ForwardAuthError>;
}

/// reqwest-backed exchanger calling `GET {endpoint}?code=...`.
#[derive(Debug, Clone)]
pub struct HttpCodeExchanger {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpCodeExchanger {
    /// Builds an exchanger whose calls are bounded by `timeout`.
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, ForwardAuthError> {
        let http = build_http_client(
            &HttpConfig::default()
                .with_timeout(timeout)
                .without_redirects()
                .with_user_agent(concat!("forwardauth-service/", env!("CARGO_PKG_VERSION"))),
        )?;
        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }
}

#[async_trait]
impl CodeExchanger for HttpCodeExchanger {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn exchange(&self, code: &str) -> Result<IdentityClaims, ForwardAuthError> {
        let started = Instant::now();
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[(CODE_PARAM, code)])
            .send()
            .await
            .map_err(|e| ForwardAuthError::from_exchange(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ForwardAuthError::from_exchange(e, self.timeout))?;
            warn!(status = status.as_u16(), "Userinfo endpoint rejected authorization code");
            return Err(ForwardAuthError::UpstreamExchange { status, body });
        }

        let payload: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| ForwardAuthError::from_exchange(e, self.timeout))?;

        let claims = IdentityClaims::from_payload(payload).ok_or_else(|| {
            ForwardAuthError::MalformedUserinfo {
                reason: "payload has no string `username`".to_string(),
            }
        })?;

        debug!(
            username = %claims.username,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Authorization code exchanged"
        );
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn exchanger(server: &MockServer, timeout: Duration) -> HttpCodeExchanger {
        let endpoint = Url::parse(&format!("{}/userinfo", server.uri())).unwrap();
        HttpCodeExchanger::new(endpoint, timeout).unwrap()
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(query_param("code", "abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"username": "alice", "id": 42})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let claims = exchanger(&server, Duration::from_secs(5))
            .await
            .exchange("abc123")
            .await
            .unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.extra.get("id"), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_non_success_status_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad_verification_code"))
            .expect(1)
            .mount(&server)
            .await;

        let err = exchanger(&server, Duration::from_secs(5))
            .await
            .exchange("stale")
            .await
            .unwrap_err();
        match err {
            ForwardAuthError::UpstreamExchange { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "bad_verification_code");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redirect_is_passed_through_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "/elsewhere")
                    .set_body_string("moved"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/elsewhere"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "mallory"})))
            .expect(0)
            .mount(&server)
            .await;

        let err = exchanger(&server, Duration::from_secs(5))
            .await
            .exchange("abc")
            .await
            .unwrap_err();
        match err {
            ForwardAuthError::UpstreamExchange { status, body } => {
                assert_eq!(status, StatusCode::FOUND);
                assert_eq!(body, "moved");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_payload_without_username_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "alice"})))
            .mount(&server)
            .await;

        let err = exchanger(&server, Duration::from_secs(5))
            .await
            .exchange("abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardAuthError::MalformedUserinfo { .. }));
    }

    #[tokio::test]
    async fn test_non_json_payload_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = exchanger(&server, Duration::from_secs(5))
            .await
            .exchange("abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardAuthError::MalformedUserinfo { .. }));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"username": "alice"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = exchanger(&server, Duration::from_millis(200))
            .await
            .exchange("abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ForwardAuthError::ExchangeTimeout { .. }));
    }
}
