//! Matches payment confirmations to registrations and applies the paid transition.

use std::sync::Arc;

use chrono::Utc;

use crate::errors::RegistrationError;
use crate::models::payment::PaymentConfirmation;
use crate::models::registration::{PaymentDetails, Registration, RegistrationType};

use super::retry::RetryPolicy;
use super::store::RegistrationStore;

/// Result of reconciling one confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationOutcome {
    /// This call flipped the registration from pending to paid.
    Transitioned(Registration),
    /// The registration was already paid; nothing was written.
    AlreadyPaid(Registration),
}

impl ReconciliationOutcome {
    pub fn registration(&self) -> &Registration {
        match self {
            ReconciliationOutcome::Transitioned(r) | ReconciliationOutcome::AlreadyPaid(r) => r,
        }
    }
}

/// Applies payment confirmations exactly once per registration.
///
/// Exactly-once comes from the store's conditional write: concurrent deliveries for the
/// same registration race on `mark_paid` and only one of them gets a row back.
#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn RegistrationStore>,
    retry: RetryPolicy,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn RegistrationStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Finds the registration a confirmation refers to.
    ///
    /// The client reference wins when it names an existing course registration. Otherwise
    /// the payer email must match exactly one course registration; several matches are
    /// ambiguous and reported as not found. Livestream signups are never payment targets.
    pub async fn resolve(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<Registration, RegistrationError> {
        if let Some(registration_id) = confirmation.registration_reference() {
            let found = self
                .retry
                .run("find_by_id", || self.store.find_by_id(registration_id))
                .await?;
            if let Some(registration) = found.filter(is_payment_target) {
                return Ok(registration);
            }
            tracing::debug!(
                registration_id = %registration_id,
                "Client reference not found, falling back to email"
            );
        }

        let Some(email) = confirmation.email.as_deref() else {
            return Err(RegistrationError::NotFound(
                "confirmation carries no usable reference or email".to_string(),
            ));
        };

        let mut candidates = self
            .retry
            .run("find_by_email", || self.store.find_by_email(email))
            .await?;
        candidates.retain(is_payment_target);

        match candidates.len() {
            0 => Err(RegistrationError::NotFound(
                "no registration for payer email".to_string(),
            )),
            1 => Ok(candidates.remove(0)),
            n => {
                tracing::warn!(
                    session_id = %confirmation.session_id,
                    candidates = n,
                    "Payer email matches several registrations and no reference was given"
                );
                Err(RegistrationError::NotFound(format!(
                    "payer email is ambiguous ({} registrations)",
                    n
                )))
            }
        }
    }

    /// Resolves the registration and marks it paid if it is still pending.
    pub async fn reconcile(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<ReconciliationOutcome, RegistrationError> {
        let registration = self.resolve(confirmation).await?;
        if registration.is_paid() {
            return Ok(ReconciliationOutcome::AlreadyPaid(registration));
        }

        let details = PaymentDetails {
            session_id: confirmation.session_id.clone(),
            amount_paid: confirmation.amount_paid,
            currency: confirmation.currency.clone(),
            paid_at: Utc::now(),
        };
        let registration_id = registration.registration_id;

        let updated = self
            .retry
            .run("mark_paid", || self.store.mark_paid(registration_id, &details))
            .await?;

        if let Some(paid) = updated {
            return Ok(ReconciliationOutcome::Transitioned(paid));
        }

        // Lost the conditional write to a concurrent delivery.
        let current = self
            .retry
            .run("find_by_id", || self.store.find_by_id(registration_id))
            .await?;
        match current {
            Some(current) if current.is_paid() => Ok(ReconciliationOutcome::AlreadyPaid(current)),
            Some(_) => Err(RegistrationError::Storage(
                "conditional write reported no change on a pending record".to_string(),
            )),
            None => Err(RegistrationError::NotFound(format!(
                "registration {} disappeared during reconciliation",
                registration_id
            ))),
        }
    }
}

fn is_payment_target(registration: &Registration) -> bool {
    registration.registration_type == RegistrationType::Course
}
