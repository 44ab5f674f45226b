//! Payment provider webhook processing.
//!
//! Order matters: the signature is checked before the body is parsed or the store is
//! touched, and side effects only follow the delivery that actually flipped the state.

use chrono::Utc;
use uuid::Uuid;

use shared::crypto::verify_stripe_signature;

use crate::errors::RegistrationError;
use crate::models::payment::{ProviderEvent, ProviderNotification};

use super::notification::{DispatchReport, NotificationDispatcher};
use super::reconciliation::{PaymentReconciler, ReconciliationOutcome};

/// Signature verification settings.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub signing_secret: String,
    /// Allowed signature age in seconds; zero disables the check.
    pub tolerance_secs: i64,
}

/// What a delivery resulted in. Every variant is acknowledged to the sender.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Transitioned {
        registration_id: Uuid,
        notifications: DispatchReport,
    },
    AlreadyPaid {
        registration_id: Uuid,
    },
    NotFound,
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Transitioned { .. } => "transitioned",
            WebhookOutcome::AlreadyPaid { .. } => "already_paid",
            WebhookOutcome::NotFound => "not_found",
            WebhookOutcome::Ignored => "ignored",
        }
    }
}

/// Verifies, parses and reconciles payment webhooks.
#[derive(Clone)]
pub struct PaymentWebhookProcessor {
    reconciler: PaymentReconciler,
    dispatcher: NotificationDispatcher,
    settings: WebhookSettings,
}

impl PaymentWebhookProcessor {
    pub fn new(
        reconciler: PaymentReconciler,
        dispatcher: NotificationDispatcher,
        settings: WebhookSettings,
    ) -> Self {
        Self {
            reconciler,
            dispatcher,
            settings,
        }
    }

    /// Processes one delivery.
    ///
    /// Errors are reserved for deliveries the sender should hear about: a bad signature,
    /// an unreadable body, or storage that stayed unavailable through every retry.
    pub async fn process(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, RegistrationError> {
        verify_stripe_signature(
            payload,
            signature,
            &self.settings.signing_secret,
            self.settings.tolerance_secs,
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook with invalid signature");
            RegistrationError::Authentication(e.to_string())
        })?;

        let event = ProviderEvent::parse(payload)
            .map_err(|e| RegistrationError::InvalidPayload(e.to_string()))?;
        let notification = event
            .interpret()
            .map_err(|e| RegistrationError::InvalidPayload(e.to_string()))?;

        let confirmation = match notification {
            ProviderNotification::Payment(confirmation) => confirmation,
            ProviderNotification::Unsettled {
                event_id,
                session_id,
            } => {
                tracing::info!(
                    event_id = %event_id,
                    session_id = %session_id,
                    "Checkout completed without settled payment, waiting for async success"
                );
                return Ok(WebhookOutcome::Ignored);
            }
            ProviderNotification::Ignored {
                event_id,
                event_type,
            } => {
                tracing::debug!(event_id = %event_id, event_type = %event_type, "Ignoring event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        match self.reconciler.reconcile(&confirmation).await {
            Ok(ReconciliationOutcome::Transitioned(registration)) => {
                tracing::info!(
                    event_id = %confirmation.event_id,
                    registration_id = %registration.registration_id,
                    amount_paid = confirmation.amount_paid,
                    "Payment reconciled"
                );
                let notifications = self.dispatcher.payment_confirmed(&registration).await;
                Ok(WebhookOutcome::Transitioned {
                    registration_id: registration.registration_id,
                    notifications,
                })
            }
            Ok(ReconciliationOutcome::AlreadyPaid(registration)) => {
                tracing::info!(
                    event_id = %confirmation.event_id,
                    registration_id = %registration.registration_id,
                    "Duplicate payment notification, registration already paid"
                );
                Ok(WebhookOutcome::AlreadyPaid {
                    registration_id: registration.registration_id,
                })
            }
            Err(RegistrationError::NotFound(reason)) => {
                tracing::warn!(
                    event_id = %confirmation.event_id,
                    session_id = %confirmation.session_id,
                    reason = %reason,
                    "No registration for payment"
                );
                Ok(WebhookOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }
}
