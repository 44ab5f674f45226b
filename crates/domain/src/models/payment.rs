//! Payment provider notification model.
//!
//! Only the fields needed for reconciliation are modelled; everything else in the
//! provider's event is ignored by serde.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use shared::validation::{normalize_email, trimmed_or_none};

/// Checkout finished; may still be awaiting an asynchronous payment method.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Delayed payment method (bank debit etc.) for a completed checkout succeeded.
pub const CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED: &str =
    "checkout.session.async_payment_succeeded";

/// Event envelope as delivered by the payment provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: ProviderEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEventData {
    pub object: Value,
}

/// Checkout session object carried by checkout events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Total in minor currency units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CheckoutSession {
    /// Payer email, preferring the details collected at checkout.
    pub fn payer_email(&self) -> Option<String> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.clone())
            .and_then(|e| trimmed_or_none(Some(e)))
            .or_else(|| trimmed_or_none(self.customer_email.clone()))
            .map(|e| normalize_email(&e))
    }

    /// Whether the session represents money actually received.
    pub fn is_settled(&self) -> bool {
        match self.payment_status.as_deref() {
            None => true,
            Some(status) => matches!(status, "paid" | "no_payment_required"),
        }
    }
}

/// Payment reference extracted from a provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub event_id: String,
    pub session_id: String,
    /// Client reference carried through checkout (the registration id issued at intake).
    pub client_reference: Option<String>,
    /// Normalized payer email.
    pub email: Option<String>,
    pub amount_paid: i64,
    pub currency: Option<String>,
}

impl PaymentConfirmation {
    /// The client reference, if it is a registration id.
    pub fn registration_reference(&self) -> Option<Uuid> {
        self.client_reference
            .as_deref()
            .and_then(|r| Uuid::parse_str(r.trim()).ok())
    }
}

/// What a verified notification asks the processor to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderNotification {
    /// Money received; reconcile against a registration.
    Payment(PaymentConfirmation),
    /// Checkout completed but the payment has not settled yet.
    Unsettled { event_id: String, session_id: String },
    /// Event type this service does not act on.
    Ignored { event_id: String, event_type: String },
}

impl ProviderEvent {
    /// Parses the raw (already authenticated) request body.
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Classifies the event and extracts the payment reference.
    pub fn interpret(&self) -> Result<ProviderNotification, serde_json::Error> {
        match self.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED | CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED => {
                let session: CheckoutSession = serde_json::from_value(self.data.object.clone())?;

                if !session.is_settled() {
                    return Ok(ProviderNotification::Unsettled {
                        event_id: self.id.clone(),
                        session_id: session.id,
                    });
                }

                Ok(ProviderNotification::Payment(PaymentConfirmation {
                    event_id: self.id.clone(),
                    email: session.payer_email(),
                    client_reference: trimmed_or_none(session.client_reference_id.clone()),
                    amount_paid: session.amount_total.unwrap_or(0),
                    currency: session.currency.clone(),
                    session_id: session.id,
                }))
            }
            other => Ok(ProviderNotification::Ignored {
                event_id: self.id.clone(),
                event_type: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkout_event(event_type: &str, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_123",
            "object": "event",
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_checkout_completed_extracts_reference() {
        let registration_id = Uuid::new_v4();
        let payload = checkout_event(
            CHECKOUT_SESSION_COMPLETED,
            json!({
                "id": "cs_test_1",
                "object": "checkout.session",
                "client_reference_id": registration_id.to_string(),
                "customer_details": { "email": " Jane@Example.com ", "name": "Jane" },
                "amount_total": 49500,
                "currency": "aud",
                "payment_status": "paid"
            }),
        );

        let event = ProviderEvent::parse(&payload).unwrap();
        match event.interpret().unwrap() {
            ProviderNotification::Payment(confirmation) => {
                assert_eq!(confirmation.event_id, "evt_123");
                assert_eq!(confirmation.session_id, "cs_test_1");
                assert_eq!(confirmation.email.as_deref(), Some("jane@example.com"));
                assert_eq!(confirmation.amount_paid, 49500);
                assert_eq!(confirmation.currency.as_deref(), Some("aud"));
                assert_eq!(confirmation.registration_reference(), Some(registration_id));
            }
            other => panic!("Expected payment, got {:?}", other),
        }
    }

    #[test]
    fn test_customer_email_fallback() {
        let session = CheckoutSession {
            id: "cs_1".to_string(),
            customer_email: Some("Fallback@Example.com".to_string()),
            customer_details: Some(CustomerDetails {
                email: None,
                name: None,
            }),
            ..Default::default()
        };
        assert_eq!(session.payer_email().as_deref(), Some("fallback@example.com"));
    }

    #[test]
    fn test_missing_amount_defaults_to_zero() {
        let payload = checkout_event(CHECKOUT_SESSION_COMPLETED, json!({ "id": "cs_1" }));
        let event = ProviderEvent::parse(&payload).unwrap();
        match event.interpret().unwrap() {
            ProviderNotification::Payment(confirmation) => {
                assert_eq!(confirmation.amount_paid, 0);
                assert!(confirmation.email.is_none());
                assert!(confirmation.client_reference.is_none());
            }
            other => panic!("Expected payment, got {:?}", other),
        }
    }

    #[test]
    fn test_unpaid_session_is_unsettled() {
        let payload = checkout_event(
            CHECKOUT_SESSION_COMPLETED,
            json!({ "id": "cs_1", "payment_status": "unpaid" }),
        );
        let event = ProviderEvent::parse(&payload).unwrap();
        assert_eq!(
            event.interpret().unwrap(),
            ProviderNotification::Unsettled {
                event_id: "evt_123".to_string(),
                session_id: "cs_1".to_string(),
            }
        );
    }

    #[test]
    fn test_async_payment_succeeded_is_payment() {
        let payload = checkout_event(
            CHECKOUT_SESSION_ASYNC_PAYMENT_SUCCEEDED,
            json!({ "id": "cs_1", "payment_status": "paid", "customer_email": "a@x.com" }),
        );
        let event = ProviderEvent::parse(&payload).unwrap();
        assert!(matches!(
            event.interpret().unwrap(),
            ProviderNotification::Payment(_)
        ));
    }

    #[test]
    fn test_other_event_types_ignored() {
        let payload = checkout_event("customer.created", json!({ "id": "cus_1" }));
        let event = ProviderEvent::parse(&payload).unwrap();
        assert_eq!(
            event.interpret().unwrap(),
            ProviderNotification::Ignored {
                event_id: "evt_123".to_string(),
                event_type: "customer.created".to_string(),
            }
        );
    }

    #[test]
    fn test_non_uuid_reference_is_not_a_registration() {
        let confirmation = PaymentConfirmation {
            event_id: "evt_1".to_string(),
            session_id: "cs_1".to_string(),
            client_reference: Some("promo-campaign".to_string()),
            email: None,
            amount_paid: 0,
            currency: None,
        };
        assert!(confirmation.registration_reference().is_none());
    }

    #[test]
    fn test_malformed_payload_rejected() {
        assert!(ProviderEvent::parse(b"not json").is_err());
        assert!(ProviderEvent::parse(br#"{"id":"evt_1"}"#).is_err());
    }
}
