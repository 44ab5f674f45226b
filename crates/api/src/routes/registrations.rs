//! Course registration endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use domain::models::{RegistrationRequest, RegistrationResponse, RegistrationType};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_registration_created;

/// Create a pending course registration.
///
/// POST /register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let Json(request) = payload?;

    let registration = state.intake.register(request).await.map_err(|e| {
        tracing::info!(error = %e, "Registration rejected");
        e
    })?;

    record_registration_created(RegistrationType::Course);

    Ok(Json(RegistrationResponse::success(
        registration.registration_id,
    )))
}
