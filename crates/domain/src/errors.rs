//! Domain error types.

use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::services::store::StoreError;

/// A single invalid or missing input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the registration and payment reconciliation flows.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Already registered for course {course_id}")]
    DuplicateRegistration { course_id: String, email: String },

    #[error("Webhook authentication failed: {0}")]
    Authentication(String),

    #[error("Registration not found: {0}")]
    NotFound(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        RegistrationError::Storage(err.to_string())
    }
}

/// Flattens `validator` output into one entry per field, ordered by field name.
///
/// Only the first failing rule of each field is reported.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                FieldError::new(field.to_string(), message)
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}
