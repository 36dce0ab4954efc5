//! End-to-end tests for the access check, driving the router directly.
//!
//! The userinfo endpoint is played by a wiremock server.

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use forwardauth::app::{AppState, router};
use forwardauth::config::Config;
use forwardauth::error::{ForwardAuthError, MISCONFIGURED_MESSAGE, WHITELIST_MISSING_MESSAGE};
use forwardauth::jwt::{IdentityClaims, TokenCodec};
use forwardauth::redirect::NOT_PERMITTED_MESSAGE;
use serde_json::{Map, json};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "integration-secret";
const PREFIX: &str = "/traefik/forwardauth";
const AUTHORIZE_URL: &str = "https://auth.example.com/oauth/github";

fn config(userinfo: Option<&str>) -> Config {
    Config {
        route_prefix: PREFIX.to_string(),
        jwt_secret: SECRET.to_string(),
        github_oauth_authorize_url: Some(Url::parse(AUTHORIZE_URL).unwrap()),
        github_oauth_userinfo_endpoint: userinfo.map(|u| Url::parse(u).unwrap()),
        exchange_timeout_secs: 2,
        ..Config::default()
    }
}

fn app(config: Config) -> Router {
    router(AppState::from_config(config).unwrap())
}

async fn app_with_provider() -> (Router, MockServer) {
    let server = MockServer::start().await;
    let userinfo = format!("{}/userinfo", server.uri());
    (app(config(Some(&userinfo))), server)
}

fn token_for(username: &str) -> String {
    TokenCodec::new(SECRET.as_bytes())
        .sign(&IdentityClaims {
            username: username.to_string(),
            extra: Map::new(),
        })
        .unwrap()
}

fn forwarded(query: &str, uri: &str) -> axum::http::request::Builder {
    forwarded_with_method("GET", query, uri)
}

fn forwarded_with_method(method: &str, query: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri(format!("{PREFIX}/authentication/github{query}"))
        .header("X-Forwarded-Method", method)
        .header("X-Forwarded-Proto", "https")
        .header("X-Forwarded-Host", "app.example.com")
        .header("X-Forwarded-Uri", uri)
        .header("X-Forwarded-For", "203.0.113.7")
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_listed_user_is_allowed() {
    let (app, _server) = app_with_provider().await;
    let request = forwarded("?whitelist=alice&whitelist=bob", "/dashboard")
        .header(COOKIE, format!("github_oauth_sig={}", token_for("alice")))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn test_unlisted_user_is_denied() {
    let (app, _server) = app_with_provider().await;
    let request = forwarded("?whitelist=bob", "/dashboard")
        .header(COOKIE, format!("github_oauth_sig={}", token_for("alice")))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, NOT_PERMITTED_MESSAGE);
}

#[tokio::test]
async fn test_custom_cookie_field_is_read() {
    let (app, _server) = app_with_provider().await;
    let request = forwarded("?use_whitelist=false&auth_cookie_field=sso", "/")
        .header(COOKIE, format!("github_oauth_sig=junk; sso={}", token_for("carol")))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_whitelist_is_unauthorized_even_with_token() {
    let (app, _server) = app_with_provider().await;
    let request = forwarded("", "/")
        .header(COOKIE, format!("github_oauth_sig={}", token_for("alice")))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, WHITELIST_MISSING_MESSAGE);
}

#[tokio::test]
async fn test_unconfigured_endpoints_answer_generic_500() {
    let app = app(config(None));
    let request = forwarded("?whitelist=alice", "/")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert_eq!(body, MISCONFIGURED_MESSAGE);
    assert!(!body.contains("USERINFO"));
}

#[tokio::test]
async fn test_preflight_bypasses_everything() {
    let app = app(config(None));
    let request = forwarded_with_method("OPTIONS", "", "/")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_forwarded_header_is_bad_request() {
    let (app, server) = app_with_provider().await;
    let request = Request::builder()
        .uri(format!("{PREFIX}/authentication/github?whitelist=alice"))
        .header("X-Forwarded-Method", "GET")
        .header("X-Forwarded-Proto", "https")
        .header("X-Forwarded-Host", "app.example.com")
        .header("X-Forwarded-For", "203.0.113.7")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("x-forwarded-uri"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_unauthenticated_redirects_to_provider() {
    let (app, _server) = app_with_provider().await;
    let request = forwarded("?whitelist=alice", "/reports?month=3&year=2024")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = Url::parse(response.headers()[LOCATION].to_str().unwrap()).unwrap();
    assert!(location.as_str().starts_with(AUTHORIZE_URL));
    let redirect_url = location
        .query_pairs()
        .find(|(key, _)| key == "redirect_url")
        .map(|(_, value)| value.into_owned());
    assert_eq!(
        redirect_url.as_deref(),
        Some("https://app.example.com/reports?month=3&year=2024")
    );
}

#[tokio::test]
async fn test_forged_cookie_is_treated_as_unauthenticated() {
    let (app, _server) = app_with_provider().await;
    let forged = TokenCodec::new(b"attacker")
        .sign(&IdentityClaims {
            username: "alice".to_string(),
            extra: Map::new(),
        })
        .unwrap();
    let request = forwarded("?whitelist=alice", "/")
        .header(COOKIE, format!("github_oauth_sig={forged}"))
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_code_exchange_sets_cookie_and_returns_to_clean_url() {
    let (app, server) = app_with_provider().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(query_param("code", "c0de"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"username": "alice", "id": 1})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = forwarded("?whitelist=alice&samesite=lax", "/home?tab=2&code=c0de")
        .body(Body::empty())
        .unwrap();
    let response = send(app.clone(), request).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[LOCATION], "https://app.example.com/home?tab=2");
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));

    // The refreshed cookie is accepted on the follow-up request.
    let cookie_pair = set_cookie.split(';').next().unwrap().to_string();
    let token = cookie_pair.trim_start_matches("github_oauth_sig=");
    let claims = TokenCodec::new(SECRET.as_bytes()).verify(Some(token)).unwrap();
    assert_eq!(claims.username(), "alice");
    assert_eq!(claims.claims().extra.get("id"), Some(&json!(1)));

    let follow_up = forwarded("?whitelist=alice", "/home?tab=2")
        .header(COOKIE, cookie_pair)
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(app, follow_up).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_provider_error_passes_through() {
    let (app, server) = app_with_provider().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad_verification_code"))
        .expect(1)
        .mount(&server)
        .await;

    let request = forwarded("?whitelist=alice", "/?code=stale")
        .body(Body::empty())
        .unwrap();
    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_text(response).await, "bad_verification_code");
}

#[tokio::test]
async fn test_provider_redirect_is_not_followed() {
    let (app, server) = app_with_provider().await;
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

    let request = forwarded("?use_whitelist=false", "/?code=abc")
        .body(Body::empty())
        .unwrap();
    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_text(response).await, "moved");
}

#[tokio::test]
async fn test_exchange_timeout_must_be_shorter_than_request_timeout() {
    let result = AppState::from_config(Config {
        exchange_timeout_secs: 3,
        request_timeout_secs: 1,
        ..config(Some("http://127.0.0.1:9/userinfo"))
    });
    assert!(matches!(result, Err(ForwardAuthError::Config(_))));
}

#[tokio::test]
async fn test_slow_provider_is_gateway_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"username": "alice"}))
                .set_delay(Duration::from_secs(4)),
        )
        .mount(&server)
        .await;
    let app = app(Config {
        exchange_timeout_secs: 1,
        request_timeout_secs: 2,
        ..config(Some(&format!("{}/userinfo", server.uri())))
    });

    let request = forwarded("?whitelist=alice", "/?code=abc")
        .body(Body::empty())
        .unwrap();
    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_invalid_samesite_is_bad_request() {
    let (app, _server) = app_with_provider().await;
    let request = forwarded("?whitelist=alice&samesite=sometimes", "/")
        .body(Body::empty())
        .unwrap();

    let response = send(app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_decisions_are_counted() {
    let (app, _server) = app_with_provider().await;
    let request = forwarded("?use_whitelist=false", "/")
        .header(COOKIE, format!("github_oauth_sig={}", token_for("alice")))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(app.clone(), request).await.status(), StatusCode::OK);

    let metrics = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let body = body_text(send(app, metrics).await).await;
    assert!(body.contains("forwardauth_decisions_total{outcome=\"allow\"} 1"));
}
