//! Integration tests for health, metrics and cross-cutting response headers.

mod common;

use axum::http::{Method, StatusCode};
use common::{get_request, parse_response_body, test_config_with, TestApp};
use course_funnel_api::middleware::init_metrics;

#[tokio::test]
async fn test_health_check_reports_store() {
    let app = TestApp::new();

    let response = app.send(get_request("/api/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);
    assert!(body["database"]["latency_ms"].is_u64());
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_liveness_and_readiness() {
    let app = TestApp::new();

    let live = app.send(get_request("/api/health/live")).await;
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(parse_response_body(live).await["status"], "alive");

    let ready = app.send(get_request("/api/health/ready")).await;
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(parse_response_body(ready).await["status"], "ready");
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::new();

    let response = app.send(get_request("/api/health/live")).await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("x-xss-protection").unwrap(), "1; mode=block");
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_hsts_when_enabled() {
    let app = TestApp::with_config(test_config_with(&[("security.hsts_enabled", "true")]));

    let response = app.send(get_request("/api/health/live")).await;

    assert!(response
        .headers()
        .get("strict-transport-security")
        .is_some());
}

#[tokio::test]
async fn test_request_id_echoed_or_generated() {
    let app = TestApp::new();

    let mut request = get_request("/api/health/live");
    request
        .headers_mut()
        .insert("x-request-id", "req-abc.123".parse().unwrap());
    let response = app.send(request).await;
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-abc.123");

    let response = app.send(get_request("/api/health/live")).await;
    let generated = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(uuid::Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn test_unacceptable_request_id_replaced() {
    let app = TestApp::new();

    let mut request = get_request("/api/health/live");
    request
        .headers_mut()
        .insert("x-request-id", "has spaces".parse().unwrap());
    let response = app.send(request).await;

    let echoed = response.headers().get("x-request-id").unwrap();
    assert_ne!(echoed, "has spaces");
}

#[tokio::test]
async fn test_metrics_endpoint_after_init() {
    init_metrics().unwrap();
    let app = TestApp::new();

    app.send(get_request("/api/health")).await;
    let response = app.send(get_request("/metrics")).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_method_rejected() {
    let app = TestApp::new();

    let response = app
        .send(
            axum::http::Request::builder()
                .method(Method::GET)
                .uri("/register")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
