//! Domain events published for downstream workflows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::registration::Registration;

/// Default event source name.
pub const DEFAULT_EVENT_SOURCE: &str = "course.registration";

/// Detail type of the event published after a registration is paid.
pub const PAYMENT_SUCCESSFUL: &str = "Payment Successful";

/// An event envelope: a named event with a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DomainEvent {
    pub source: String,
    pub detail_type: String,
    pub detail: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Payload of the payment successful event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PaymentSucceeded {
    pub registration_id: Uuid,
    pub course_id: String,
    pub email: String,
    pub name: String,
    pub amount_paid: i64,
    pub currency: Option<String>,
    pub stripe_session_id: Option<String>,
}

impl From<&Registration> for PaymentSucceeded {
    fn from(registration: &Registration) -> Self {
        Self {
            registration_id: registration.registration_id,
            course_id: registration.course_id.clone(),
            email: registration.email.clone(),
            name: registration.name.clone(),
            amount_paid: registration.amount_paid.unwrap_or(0),
            currency: registration.currency.clone(),
            stripe_session_id: registration.stripe_session_id.clone(),
        }
    }
}

impl DomainEvent {
    /// Builds the payment successful event for a freshly paid registration.
    pub fn payment_successful(source: &str, registration: &Registration) -> Self {
        let detail = PaymentSucceeded::from(registration);
        Self {
            source: source.to_string(),
            detail_type: PAYMENT_SUCCESSFUL.to_string(),
            detail: serde_json::to_value(detail).unwrap_or(Value::Null),
            occurred_at: Utc::now(),
        }
    }
}
