use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{
    EventPublisher, Mailer, NotificationDispatcher, PaymentReconciler, PaymentWebhookProcessor,
    RegistrationIntake, RegistrationStore,
};

use crate::config::Config;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, security_headers_middleware,
    trace_id, RateLimiterState,
};
use crate::routes::{contact, health, livestream, registrations, stripe_webhook};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RegistrationStore>,
    pub intake: RegistrationIntake,
    pub webhooks: PaymentWebhookProcessor,
    pub dispatcher: NotificationDispatcher,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
}

impl AppState {
    /// Wires the domain services from configuration and the external collaborators.
    pub fn new(
        config: Config,
        store: Arc<dyn RegistrationStore>,
        mailer: Arc<dyn Mailer>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let dispatcher = NotificationDispatcher::new(mailer, publisher, config.dispatch_settings());
        let intake = RegistrationIntake::new(store.clone(), config.intake_settings());
        let webhooks = PaymentWebhookProcessor::new(
            PaymentReconciler::new(store.clone(), config.retry_policy()),
            dispatcher.clone(),
            config.webhook_settings(),
        );
        let rate_limiter =
            RateLimiterState::new(config.security.form_rate_limit_per_minute).map(Arc::new);

        Self {
            config: Arc::new(config),
            store,
            intake,
            webhooks,
            dispatcher,
            rate_limiter,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Public form routes, limited per client IP
    let form_routes = Router::new()
        .route("/register", post(registrations::register))
        .route("/livestream", post(livestream::signup))
        .route("/contact", post(contact::submit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Provider webhooks authenticate by signature and are never rate limited
    let webhook_routes = Router::new()
        .route("/stripe-webhook", post(stripe_webhook::receive))
        .route("/webhook/stripe", post(stripe_webhook::receive));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(form_routes)
        .merge(webhook_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
