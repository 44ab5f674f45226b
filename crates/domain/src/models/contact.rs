//! Contact form model.

use serde::Deserialize;
use validator::Validate;

use shared::validation::{normalize_email, trimmed_or_none};

/// Request payload for the contact form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ContactRequest {
    #[validate(
        required(message = "Name is required"),
        length(max = 200, message = "Name must be at most 200 characters")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: Option<String>,

    #[validate(required(message = "Mobile is required"))]
    pub mobile: Option<String>,

    #[validate(
        required(message = "Message is required"),
        length(max = 5000, message = "Message must be at most 5000 characters")
    )]
    pub message: Option<String>,
}

impl ContactRequest {
    pub fn normalized(self) -> Self {
        Self {
            name: trimmed_or_none(self.name),
            email: trimmed_or_none(self.email).map(|e| normalize_email(&e)),
            mobile: trimmed_or_none(self.mobile),
            message: trimmed_or_none(self.message),
        }
    }
}

/// A validated contact message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_request_all_fields_required() {
        let request = ContactRequest {
            name: Some("  ".to_string()),
            ..Default::default()
        }
        .normalized();
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 4);
    }

    #[test]
    fn test_contact_request_valid() {
        let request = ContactRequest {
            name: Some("Sam".to_string()),
            email: Some("Sam@Example.com".to_string()),
            mobile: Some("0400 000 000".to_string()),
            message: Some(" Do you run weekend sessions? ".to_string()),
        }
        .normalized();
        assert!(request.validate().is_ok());
        assert_eq!(request.message.as_deref(), Some("Do you run weekend sessions?"));
    }
}
