use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use domain::{FieldError, RegistrationError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Email send failed: {0}")]
    EmailSendFailed(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidSignature(_) | ApiError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::DuplicateRegistration(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EmailSendFailed(_) => StatusCode::BAD_GATEWAY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::DuplicateRegistration(_) => "duplicate_registration",
            ApiError::InvalidSignature(_) => "invalid_signature",
            ApiError::InvalidPayload(_) => "invalid_payload",
            ApiError::NotFound(_) => "not_found",
            ApiError::EmailSendFailed(_) => "email_send_failed",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let (message, details) = match self {
            ApiError::Validation(fields) => {
                let message = if fields.len() == 1 {
                    fields[0].message.clone()
                } else {
                    format!("{} validation errors", fields.len())
                };
                let details = fields
                    .into_iter()
                    .map(|f| ValidationDetail {
                        field: f.field,
                        message: f.message,
                    })
                    .collect();
                (message, Some(details))
            }
            ApiError::RateLimited => ("Too many requests. Please try again later.".into(), None),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".into(), None)
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!("Service unavailable: {}", msg);
                ("Service temporarily unavailable, please retry".into(), None)
            }
            ApiError::EmailSendFailed(msg) => {
                tracing::error!("Email send failed: {}", msg);
                ("Failed to send message, please try again later".into(), None)
            }
            ApiError::DuplicateRegistration(msg)
            | ApiError::InvalidSignature(msg)
            | ApiError::InvalidPayload(msg)
            | ApiError::NotFound(msg) => (msg, None),
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Validation(fields) => ApiError::Validation(fields),
            RegistrationError::DuplicateRegistration { course_id, .. } => {
                ApiError::DuplicateRegistration(format!(
                    "This email is already registered for course {}",
                    course_id
                ))
            }
            RegistrationError::Authentication(msg) => ApiError::InvalidSignature(msg),
            RegistrationError::InvalidPayload(msg) => ApiError::InvalidPayload(msg),
            RegistrationError::NotFound(msg) => ApiError::NotFound(msg),
            RegistrationError::Storage(msg) => ApiError::ServiceUnavailable(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![FieldError::new("body", rejection.body_text())])
    }
}
