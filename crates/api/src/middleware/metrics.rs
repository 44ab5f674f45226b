//! Prometheus metrics middleware.
//!
//! Provides HTTP request/response metrics collection and export, plus the business
//! counters recorded by the route handlers.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use domain::services::{DispatchReport, WebhookOutcome};
use domain::models::RegistrationType;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Middleware to record HTTP request metrics.
///
/// Records the following metrics:
/// - `http_requests_total`: Counter with labels (method, path, status)
/// - `http_request_duration_seconds`: Histogram with labels (method, path)
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(duration);

    response
}

/// Convert HTTP method to string for metric labels.
fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

pub fn record_registration_created(registration_type: RegistrationType) {
    counter!(
        "registrations_created_total",
        "type" => registration_type.as_str()
    )
    .increment(1);
}

pub fn record_webhook_outcome(outcome: &WebhookOutcome) {
    counter!("payment_webhooks_total", "outcome" => outcome.as_str()).increment(1);
}

/// Webhook deliveries that were answered with an error, labelled by error code.
pub fn record_webhook_rejected(code: &'static str) {
    counter!("payment_webhooks_total", "outcome" => code).increment(1);
}

/// Counts every notification in the report that failed or timed out.
pub fn record_notification_failures(report: &DispatchReport) {
    for kind in &report.failed {
        counter!("notifications_failed_total", "kind" => kind.as_str()).increment(1);
    }
}

/// Handler for /metrics endpoint that returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        )
    }
}

/// Initialize the Prometheus metrics recorder.
///
/// Called once during startup before any metrics are recorded. A second call is a
/// no-op so tests that build several apps do not fight over the global recorder.
pub fn init_metrics() -> Result<(), BuildError> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    // Lost a race with another initializer; its handle serves the same recorder.
    let _ = PROMETHEUS_HANDLE.set(handle);
    Ok(())
}
