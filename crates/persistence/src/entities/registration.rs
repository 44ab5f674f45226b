//! Registration entity (database row mapping).

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::registration::Registration;

/// Database row mapping for the registrations table.
#[derive(Debug, Clone, FromRow)]
pub struct RegistrationEntity {
    pub registration_id: Uuid,
    pub course_id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub registration_type: String,
    pub metadata: Value,
    pub payment_status: String,
    pub registration_date: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
    pub stripe_session_id: Option<String>,
    pub amount_paid: Option<i64>,
    pub currency: Option<String>,
}

impl TryFrom<RegistrationEntity> for Registration {
    type Error = String;

    fn try_from(entity: RegistrationEntity) -> Result<Self, Self::Error> {
        let metadata = match entity.metadata {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => return Err(format!("metadata is not an object: {}", other)),
        };

        Ok(Self {
            registration_id: entity.registration_id,
            course_id: entity.course_id,
            email: entity.email,
            name: entity.name,
            phone: entity.phone,
            company: entity.company,
            job_title: entity.job_title,
            registration_type: entity.registration_type.parse()?,
            metadata,
            payment_status: entity.payment_status.parse()?,
            registration_date: entity.registration_date,
            payment_date: entity.payment_date,
            stripe_session_id: entity.stripe_session_id,
            amount_paid: entity.amount_paid,
            currency: entity.currency,
        })
    }
}
