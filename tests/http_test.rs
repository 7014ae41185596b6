// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router-level tests for the credibility gate.

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use credibility_gate::{
    config::{AuthConfig, Config, RateLimitConfig},
    handlers::router,
    AppState, StaticAnalysisEngine,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const KEY: &str = "test-key-123";

fn config_with_key(api_key: Option<&str>) -> Config {
    Config {
        auth: AuthConfig {
            api_key: api_key.map(str::to_string),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn app_with(config: Config) -> Router {
    router(Arc::new(AppState::with_defaults(config).unwrap()))
}

fn app() -> Router {
    app_with(config_with_key(Some(KEY)))
}

fn analyze_request(key: Option<&str>, body: &str, client: [u8; 4]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/analyze")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    let mut request = builder.body(Body::from(body.to_string())).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((client, 40000))));
    request
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn expected_result() -> Value {
    serde_json::to_value(StaticAnalysisEngine::new().result()).unwrap()
}

#[tokio::test]
async fn test_root_liveness() {
    let app = app();
    let response = send(
        &app,
        Request::builder().uri("/").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(!bytes.is_empty());
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app();
    let response = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_alias_is_not_served() {
    let app = app();
    let response = send(
        &app,
        Request::builder().uri("/healthz").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_valid_key_no_body_returns_fixed_result() {
    let app = app();
    let response = send(&app, analyze_request(Some(KEY), "", [10, 0, 0, 1])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "30");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "29");
    assert_eq!(json_body(response).await, expected_result());
}

#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let app = app();
    let response = send(&app, analyze_request(None, "{}", [10, 0, 0, 1])).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        serde_json::json!({"error": "Unauthorized"})
    );
}

#[tokio::test]
async fn test_wrong_key_is_unauthorized() {
    let app = app();
    for wrong in ["test-key-12", "test-key-1234", "TEST-KEY-123", "nope"] {
        let response = send(&app, analyze_request(Some(wrong), "{}", [10, 0, 0, 1])).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "key {wrong:?}");
    }
}

#[tokio::test]
async fn test_unconfigured_key_is_server_error() {
    let app = app_with(config_with_key(None));
    for key in [None, Some(KEY), Some("")] {
        let response = send(&app, analyze_request(key, "{}", [10, 0, 0, 1])).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"error": "Server misconfigured"})
        );
    }
}

#[tokio::test]
async fn test_sixth_pro_request_is_rate_limited() {
    let app = app();
    for i in 0..5 {
        let response = send(
            &app,
            analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 0, 2]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
    }

    let response = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 0, 2]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    let body = json_body(response).await;
    assert_eq!(body["error"], "Too many requests, please try again later.");
}

#[tokio::test]
async fn test_standard_limit_applies_to_absent_and_unknown_mode() {
    let app = app();
    let bodies = ["", "{}", r#"{"mode":"standard"}"#, r#"{"mode":"turbo"}"#];
    for i in 0..30 {
        let body = bodies[i % bodies.len()];
        let response = send(&app, analyze_request(Some(KEY), body, [10, 0, 0, 3])).await;
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
    }
    let response = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"unknown"}"#, [10, 0, 0, 3]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_mode_is_case_insensitive() {
    let app = app();
    let response = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"PRO"}"#, [10, 0, 0, 4]),
    )
    .await;
    assert_eq!(response.headers()["x-ratelimit-limit"], "5");
}

#[tokio::test]
async fn test_result_ignores_other_fields() {
    let app = app();
    let a = send(
        &app,
        analyze_request(Some(KEY), r#"{"text":"the moon is cheese"}"#, [10, 0, 0, 5]),
    )
    .await;
    let b = send(
        &app,
        analyze_request(
            Some(KEY),
            r#"{"mode":"pro","url":"https://example.com","extra":[1,2]}"#,
            [10, 0, 0, 5],
        ),
    )
    .await;
    assert_eq!(json_body(a).await, json_body(b).await);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app();
    let response = send(&app, analyze_request(Some(KEY), "{\"mode\":", [10, 0, 0, 6])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_json_body_is_ignored() {
    let app = app();
    let mut request = analyze_request(Some(KEY), "hello", [10, 0, 0, 8]);
    request
        .headers_mut()
        .insert("content-type", "text/plain".parse().unwrap());
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "30");
    assert_eq!(json_body(response).await, expected_result());

    // An undeclared body is not read either, so "pro" is not selected
    let mut request = analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 0, 8]);
    request.headers_mut().remove("content-type");
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "30");
}

#[tokio::test]
async fn test_json_content_type_with_charset_is_parsed() {
    let app = app();
    let mut request = analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 0, 9]);
    request.headers_mut().insert(
        "content-type",
        "application/json; charset=utf-8".parse().unwrap(),
    );
    let response = send(&app, request).await;
    assert_eq!(response.headers()["x-ratelimit-limit"], "5");
}

#[tokio::test]
async fn test_unauthorized_requests_do_not_consume_quota() {
    let app = app();
    for _ in 0..10 {
        send(&app, analyze_request(Some("bad"), r#"{"mode":"pro"}"#, [10, 0, 0, 7])).await;
    }
    let response = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 0, 7]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let app = app();
    for _ in 0..5 {
        send(&app, analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 1, 1])).await;
    }
    let blocked = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 1, 1]),
    )
    .await;
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 1, 2]),
    )
    .await;
    assert_eq!(other.status(), StatusCode::OK);

    // Same client, other tier
    let standard = send(&app, analyze_request(Some(KEY), "{}", [10, 0, 1, 1])).await;
    assert_eq!(standard.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn test_window_reset_readmits_client() {
    let app = app();
    for _ in 0..5 {
        send(&app, analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 2, 1])).await;
    }
    let blocked = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 2, 1]),
    )
    .await;
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::advance(Duration::from_secs(61)).await;

    let response = send(
        &app,
        analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [10, 0, 2, 1]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
}

#[tokio::test]
async fn test_configured_limits_are_honoured() {
    let app = app_with(Config {
        rate_limit: RateLimitConfig {
            standard_per_window: 2,
            pro_per_window: 1,
            ..Default::default()
        },
        ..config_with_key(Some(KEY))
    });

    for _ in 0..2 {
        let ok = send(&app, analyze_request(Some(KEY), "", [10, 0, 3, 1])).await;
        assert_eq!(ok.status(), StatusCode::OK);
    }
    let limited = send(&app, analyze_request(Some(KEY), "", [10, 0, 3, 1])).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_outcomes() {
    let app = app();
    send(&app, analyze_request(Some(KEY), "", [10, 0, 4, 1])).await;
    send(&app, analyze_request(None, "", [10, 0, 4, 1])).await;

    let response = send(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec(),
    )
    .unwrap();
    assert!(text.contains("gate_requests_total{outcome=\"allowed\"} 1"));
    assert!(text.contains("gate_requests_total{outcome=\"unauthorized\"} 1"));
}

#[tokio::test]
async fn test_metrics_endpoint_can_be_disabled() {
    let mut config = config_with_key(Some(KEY));
    config.metrics.enabled = false;
    let app = app_with(config);

    let response = send(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_served_on_custom_path() {
    let mut config = config_with_key(Some(KEY));
    config.metrics.path = "/internal/metrics".to_string();
    let app = app_with(config);

    let response = send(
        &app,
        Request::builder()
            .uri("/internal/metrics")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_forwarded_for_keys_clients_when_trusted() {
    let mut config = config_with_key(Some(KEY));
    config.rate_limit.trust_forwarded_for = true;
    config.rate_limit.pro_per_window = 1;
    let app = app_with(config);

    let forwarded = |ip: &str| {
        let mut request = analyze_request(Some(KEY), r#"{"mode":"pro"}"#, [127, 0, 0, 1]);
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    assert_eq!(send(&app, forwarded("198.51.100.1")).await.status(), StatusCode::OK);
    assert_eq!(
        send(&app, forwarded("198.51.100.1")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(send(&app, forwarded("198.51.100.2")).await.status(), StatusCode::OK);
}
