//! Free livestream signup endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use domain::models::{LivestreamRequest, RegistrationResponse, RegistrationType};
use domain::services::LivestreamSignup;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::{record_notification_failures, record_registration_created};

/// Sign up for the livestream.
///
/// POST /livestream
///
/// Repeat signups answer exactly like fresh ones so the endpoint does not reveal which
/// addresses are already registered; only fresh signups are emailed.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<LivestreamRequest>, JsonRejection>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let Json(request) = payload?;

    let signup = state.intake.register_livestream(request).await?;

    if let LivestreamSignup::Created(registration) = &signup {
        record_registration_created(RegistrationType::Livestream);
        let report = state.dispatcher.livestream_signup(registration).await;
        record_notification_failures(&report);
    }

    Ok(Json(RegistrationResponse::success(
        signup.registration().registration_id,
    )))
}
