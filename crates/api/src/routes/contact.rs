//! Contact form endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;

use domain::models::ContactRequest;
use domain::services::validate_contact;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub message: String,
}

/// Forward a contact form message to the admin inbox.
///
/// POST /contact
pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<ContactRequest>, JsonRejection>,
) -> Result<Json<ContactResponse>, ApiError> {
    let Json(request) = payload?;
    let message = validate_contact(request)?;

    state
        .dispatcher
        .forward_contact(&message)
        .await
        .map_err(|e| ApiError::EmailSendFailed(e.to_string()))?;

    tracing::info!("Contact message forwarded");

    Ok(Json(ContactResponse {
        message: "Message sent".to_string(),
    }))
}
