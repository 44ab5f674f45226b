//! Registration intake: validates form submissions and creates records.

use std::sync::Arc;

use serde_json::Map;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{field_errors, FieldError, RegistrationError};
use crate::models::contact::{ContactMessage, ContactRequest};
use crate::models::registration::{
    LivestreamRequest, NewRegistration, PaymentStatus, Registration, RegistrationRequest,
    RegistrationType,
};

use super::store::{RegistrationStore, StoreError};

/// Intake settings.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// Courses that accept registrations. Empty allows any course.
    pub allowed_course_ids: Vec<String>,
    /// Course id that free livestream signups are recorded under.
    pub livestream_course_id: String,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            allowed_course_ids: Vec::new(),
            livestream_course_id: "tax-livestream-01".to_string(),
        }
    }
}

/// Result of a livestream signup.
#[derive(Debug, Clone)]
pub enum LivestreamSignup {
    Created(Registration),
    /// The email was already signed up; carries the existing record.
    Existing(Registration),
}

impl LivestreamSignup {
    pub fn registration(&self) -> &Registration {
        match self {
            LivestreamSignup::Created(r) | LivestreamSignup::Existing(r) => r,
        }
    }
}

/// Creates registrations from validated form submissions.
#[derive(Clone)]
pub struct RegistrationIntake {
    store: Arc<dyn RegistrationStore>,
    settings: IntakeSettings,
}

impl RegistrationIntake {
    pub fn new(store: Arc<dyn RegistrationStore>, settings: IntakeSettings) -> Self {
        Self { store, settings }
    }

    /// Creates a pending course registration.
    ///
    /// Every invalid field is reported at once. A second registration for the same
    /// course and email is rejected whatever its payment state.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<Registration, RegistrationError> {
        let request = request.normalized();

        let mut errors = match request.validate() {
            Ok(()) => Vec::new(),
            Err(e) => field_errors(&e),
        };
        if let Some(course_id) = &request.course_id {
            if !self.is_course_allowed(course_id) && !errors.iter().any(|e| e.field == "course_id")
            {
                errors.push(FieldError::new("course_id", "Unknown course"));
                errors.sort_by(|a, b| a.field.cmp(&b.field));
            }
        }
        if !errors.is_empty() {
            return Err(RegistrationError::Validation(errors));
        }

        let metadata = request.collect_metadata();
        let RegistrationRequest {
            email: Some(email),
            name: Some(name),
            phone: Some(phone),
            course_id: Some(course_id),
            company,
            job_title,
            ..
        } = request
        else {
            return Err(RegistrationError::Validation(vec![FieldError::new(
                "body",
                "Required fields are missing",
            )]));
        };

        let new = NewRegistration {
            registration_id: Uuid::new_v4(),
            course_id: course_id.clone(),
            email: email.clone(),
            name,
            phone,
            company,
            job_title,
            registration_type: RegistrationType::Course,
            metadata,
            payment_status: PaymentStatus::Pending,
            amount_paid: None,
        };

        let registration = self.store.insert_if_absent(new).await.map_err(|e| match e {
            StoreError::Duplicate => RegistrationError::DuplicateRegistration { course_id, email },
            other => other.into(),
        })?;

        tracing::info!(
            registration_id = %registration.registration_id,
            course_id = %registration.course_id,
            "Registration created"
        );

        Ok(registration)
    }

    /// Records a free livestream signup, created already paid.
    ///
    /// Repeat signups return the existing record instead of an error.
    pub async fn register_livestream(
        &self,
        request: LivestreamRequest,
    ) -> Result<LivestreamSignup, RegistrationError> {
        let request = request.normalized();
        request
            .validate()
            .map_err(|e| RegistrationError::Validation(field_errors(&e)))?;

        let (Some(email), Some(name)) = (request.email, request.name) else {
            return Err(RegistrationError::Validation(vec![FieldError::new(
                "body",
                "Required fields are missing",
            )]));
        };

        let course_id = self.settings.livestream_course_id.clone();
        let new = NewRegistration {
            registration_id: Uuid::new_v4(),
            course_id: course_id.clone(),
            email: email.clone(),
            name,
            phone: String::new(),
            company: None,
            job_title: None,
            registration_type: RegistrationType::Livestream,
            metadata: Map::new(),
            payment_status: PaymentStatus::Paid,
            amount_paid: Some(0),
        };

        match self.store.insert_if_absent(new).await {
            Ok(registration) => {
                tracing::info!(
                    registration_id = %registration.registration_id,
                    course_id = %registration.course_id,
                    "Livestream signup created"
                );
                Ok(LivestreamSignup::Created(registration))
            }
            Err(StoreError::Duplicate) => {
                let existing = self
                    .store
                    .find_by_course_and_email(&course_id, &email)
                    .await?
                    .ok_or_else(|| {
                        RegistrationError::Storage(
                            "livestream signup vanished after duplicate insert".to_string(),
                        )
                    })?;
                tracing::info!(
                    registration_id = %existing.registration_id,
                    "Repeat livestream signup"
                );
                Ok(LivestreamSignup::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_course_allowed(&self, course_id: &str) -> bool {
        self.settings.allowed_course_ids.is_empty()
            || self
                .settings
                .allowed_course_ids
                .iter()
                .any(|allowed| allowed == course_id)
    }
}

/// Validates a contact form submission.
pub fn validate_contact(request: ContactRequest) -> Result<ContactMessage, RegistrationError> {
    let request = request.normalized();
    request
        .validate()
        .map_err(|e| RegistrationError::Validation(field_errors(&e)))?;

    match (request.name, request.email, request.mobile, request.message) {
        (Some(name), Some(email), Some(mobile), Some(message)) => Ok(ContactMessage {
            name,
            email,
            mobile,
            message,
        }),
        _ => Err(RegistrationError::Validation(vec![FieldError::new(
            "body",
            "Required fields are missing",
        )])),
    }
}
