//! Common test utilities for integration tests.
//!
//! Builds the full router against the in-memory registration store and recording
//! mailer/publisher doubles, so the HTTP surface can be exercised without PostgreSQL.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use chrono::Utc;
use course_funnel_api::{
    app::{create_app, AppState},
    config::Config,
};
use domain::services::{InMemoryRegistrationStore, RecordingMailer, RecordingPublisher};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};
use shared::crypto::sign_stripe_payload;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_integration";
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Test configuration with a webhook secret, admin address and rate limiting off.
pub fn test_config() -> Config {
    test_config_with(&[])
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let mut all = vec![
        ("database.url", "postgres://unused"),
        ("stripe.webhook_secret", WEBHOOK_SECRET),
        ("notifications.admin_email", ADMIN_EMAIL),
        ("notifications.timeout_ms", "200"),
        ("reconciliation.initial_backoff_ms", "1"),
        ("reconciliation.max_backoff_ms", "5"),
        ("security.form_rate_limit_per_minute", "0"),
    ];
    all.extend_from_slice(overrides);
    Config::load_with_overrides(&all).expect("Failed to build test config")
}

/// A router plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryRegistrationStore>,
    pub mailer: Arc<RecordingMailer>,
    pub publisher: Arc<RecordingPublisher>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_mailer(config, RecordingMailer::new())
    }

    pub fn with_mailer(config: Config, mailer: RecordingMailer) -> Self {
        let store = Arc::new(InMemoryRegistrationStore::new());
        let mailer = Arc::new(mailer);
        let publisher = Arc::new(RecordingPublisher::new());
        let state = AppState::new(config, store.clone(), mailer.clone(), publisher.clone());

        Self {
            router: create_app(state),
            store,
            mailer,
            publisher,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        use tower::ServiceExt;

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Registers through the API and returns the new registration id.
    pub async fn register(&self, course_id: &str, email: &str) -> Uuid {
        let response = self
            .send(json_request(
                Method::POST,
                "/register",
                registration_body(course_id, email),
            ))
            .await;
        let body = parse_response_body(response).await;
        body["registration_id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("registration id in response")
    }
}

pub fn registration_body(course_id: &str, email: &str) -> Value {
    let name: String = Name().fake();
    json!({
        "email": email,
        "name": name,
        "phone": "0412 345 678",
        "course_id": course_id,
    })
}

pub fn unique_test_email() -> String {
    let email: String = SafeEmail().fake();
    format!("{}.{}", Uuid::new_v4().simple(), email)
}

/// Build a JSON request.
pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn json_request_from(method: Method, uri: &str, body: Value, client_ip: &str) -> Request<Body> {
    let mut request = json_request(method, uri, body);
    request
        .headers_mut()
        .insert("x-forwarded-for", client_ip.parse().unwrap());
    request
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// A `checkout.session.completed` event body.
pub fn checkout_completed(reference: Option<Uuid>, email: &str, amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": format!("cs_test_{}", Uuid::new_v4().simple()),
            "client_reference_id": reference.map(|r| r.to_string()),
            "customer_details": { "email": email },
            "amount_total": amount,
            "currency": "aud",
            "payment_status": "paid"
        }}
    }))
    .unwrap()
}

/// A webhook request signed with the test secret.
pub fn signed_webhook(uri: &str, body: Vec<u8>) -> Request<Body> {
    let signature = sign_stripe_payload(&body, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
    webhook_with_signature(uri, body, Some(&signature))
}

pub fn webhook_with_signature(uri: &str, body: Vec<u8>, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("Stripe-Signature", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Parse response body as JSON.
pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}
