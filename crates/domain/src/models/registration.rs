//! Registration domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use shared::validation::{normalize_email, trimmed_or_none, validate_phone};

/// Payment state of a registration. Only `Pending -> Paid` is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    /// Whether moving from `self` to `next` is a legal state change.
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!((self, next), (PaymentStatus::Pending, PaymentStatus::Paid))
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("Unknown payment status: {}", other)),
        }
    }
}

/// Which form produced the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    Course,
    Livestream,
}

impl RegistrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationType::Course => "course",
            RegistrationType::Livestream => "livestream",
        }
    }
}

impl std::fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(RegistrationType::Course),
            "livestream" => Ok(RegistrationType::Livestream),
            other => Err(format!("Unknown registration type: {}", other)),
        }
    }
}

/// A stored registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Registration {
    pub registration_id: Uuid,
    pub course_id: String,
    /// Normalized (trimmed, lowercased) email; the matching key for webhooks.
    pub email: String,
    pub name: String,
    pub phone: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub registration_type: RegistrationType,
    pub metadata: Map<String, Value>,
    pub payment_status: PaymentStatus,
    pub registration_date: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
    pub stripe_session_id: Option<String>,
    /// Amount in minor currency units, as reported by the payment provider.
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,
}

impl Registration {
    /// Materializes a new record, stamping `registration_date` (and `payment_date` for
    /// records created already paid).
    pub fn from_new(new: NewRegistration, now: DateTime<Utc>) -> Self {
        let payment_date = match new.payment_status {
            PaymentStatus::Paid => Some(now),
            PaymentStatus::Pending => None,
        };

        Self {
            registration_id: new.registration_id,
            course_id: new.course_id,
            email: new.email,
            name: new.name,
            phone: new.phone,
            company: new.company,
            job_title: new.job_title,
            registration_type: new.registration_type,
            metadata: new.metadata,
            payment_status: new.payment_status,
            registration_date: now,
            payment_date,
            stripe_session_id: None,
            amount_paid: new.amount_paid,
            currency: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Applies a payment if the record is still pending. Returns whether it changed.
    pub fn apply_payment(&mut self, details: &PaymentDetails) -> bool {
        if !self.payment_status.can_transition_to(PaymentStatus::Paid) {
            return false;
        }

        self.payment_status = PaymentStatus::Paid;
        self.payment_date = Some(details.paid_at);
        self.stripe_session_id = Some(details.session_id.clone());
        self.amount_paid = Some(details.amount_paid);
        self.currency = details.currency.clone();
        true
    }
}

/// Data for inserting a registration.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegistration {
    pub registration_id: Uuid,
    pub course_id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub registration_type: RegistrationType,
    pub metadata: Map<String, Value>,
    pub payment_status: PaymentStatus,
    pub amount_paid: Option<i64>,
}

/// Payment facts written at the `pending -> paid` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub session_id: String,
    pub amount_paid: i64,
    pub currency: Option<String>,
    pub paid_at: DateTime<Utc>,
}

/// Request payload for course registration.
///
/// Every field is optional at the serde level so that all missing fields are reported
/// together by validation rather than failing deserialization on the first one.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegistrationRequest {
    #[validate(
        required(message = "Email is required"),
        email(message = "Invalid email format"),
        length(max = 254, message = "Email must be at most 254 characters")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "Name is required"),
        length(max = 200, message = "Name must be at most 200 characters")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "Phone is required"),
        custom(function = "validate_phone")
    )]
    pub phone: Option<String>,

    #[validate(
        required(message = "Course ID is required"),
        length(max = 100, message = "Course ID must be at most 100 characters")
    )]
    pub course_id: Option<String>,

    pub company: Option<String>,
    pub job_title: Option<String>,
    pub dietary_requirements: Option<String>,
    pub automation_interest: Option<String>,
    pub referral_source: Option<String>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RegistrationRequest {
    /// Trims every field, lowercases the email and maps blanks to `None`.
    pub fn normalized(self) -> Self {
        Self {
            email: trimmed_or_none(self.email).map(|e| normalize_email(&e)),
            name: trimmed_or_none(self.name),
            phone: trimmed_or_none(self.phone),
            course_id: trimmed_or_none(self.course_id),
            company: trimmed_or_none(self.company),
            job_title: trimmed_or_none(self.job_title),
            dietary_requirements: trimmed_or_none(self.dietary_requirements),
            automation_interest: trimmed_or_none(self.automation_interest),
            referral_source: trimmed_or_none(self.referral_source),
            metadata: self.metadata,
        }
    }

    /// Pass-through form fields stored alongside the record.
    pub fn collect_metadata(&self) -> Map<String, Value> {
        let mut metadata = self.metadata.clone();
        let extras = [
            ("dietary_requirements", &self.dietary_requirements),
            ("automation_interest", &self.automation_interest),
            ("referral_source", &self.referral_source),
        ];
        for (key, value) in extras {
            if let Some(v) = value {
                metadata.insert(key.to_string(), Value::String(v.clone()));
            }
        }
        metadata
    }
}

/// Request payload for the free livestream signup.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct LivestreamRequest {
    #[validate(
        required(message = "Email is required"),
        email(message = "Invalid email format")
    )]
    pub email: Option<String>,

    #[validate(
        required(message = "Name is required"),
        length(max = 200, message = "Name must be at most 200 characters")
    )]
    pub name: Option<String>,
}

impl LivestreamRequest {
    pub fn normalized(self) -> Self {
        Self {
            email: trimmed_or_none(self.email).map(|e| normalize_email(&e)),
            name: trimmed_or_none(self.name),
        }
    }
}

/// Response payload for successful registrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegistrationResponse {
    pub registration_id: Uuid,
    pub message: String,
}

impl RegistrationResponse {
    pub fn success(registration_id: Uuid) -> Self {
        Self {
            registration_id,
            message: "Registration successful".to_string(),
        }
    }
}
