//! Payment provider webhook endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{Extensions, HeaderMap},
    Json,
};
use serde::Serialize;

use domain::services::WebhookOutcome;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::{
    record_notification_failures, record_webhook_outcome, record_webhook_rejected,
};
use crate::middleware::trace_id::get_request_id;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Acknowledgement body. Every non-error outcome is a 200 so the provider stops
/// redelivering.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

/// Receive a signed payment event.
///
/// POST /stripe-webhook (alias: POST /webhook/stripe)
///
/// The body is taken as raw bytes since the signature covers the exact payload.
pub async fn receive(
    State(state): State<AppState>,
    extensions: Extensions,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.webhooks.process(&body, signature).await {
        Ok(outcome) => {
            record_webhook_outcome(&outcome);
            if let WebhookOutcome::Transitioned { notifications, .. } = &outcome {
                record_notification_failures(notifications);
            }
            tracing::info!(
                request_id = %get_request_id(&extensions),
                outcome = outcome.as_str(),
                "Webhook processed"
            );
            Ok(Json(WebhookAck {
                received: true,
                outcome: outcome.as_str(),
            }))
        }
        Err(e) => {
            let error = ApiError::from(e);
            record_webhook_rejected(error.code());
            tracing::warn!(
                request_id = %get_request_id(&extensions),
                error = %error,
                "Webhook rejected"
            );
            Err(error)
        }
    }
}
