//! Registration repository: the PostgreSQL registration store.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::registration::{NewRegistration, PaymentDetails, Registration};
use domain::services::store::{RegistrationStore, StoreError};

use crate::entities::RegistrationEntity;
use crate::metrics::QueryTimer;

const UNIQUE_VIOLATION: &str = "23505";

/// Repository for registration database operations.
#[derive(Clone)]
pub struct RegistrationRepository {
    pool: PgPool,
}

impl RegistrationRepository {
    /// Creates a new RegistrationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a registration unless `(course_id, email)` is taken.
    ///
    /// Returns `None` on conflict.
    pub async fn insert(
        &self,
        registration: &Registration,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_registration");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            INSERT INTO registrations (
                registration_id, course_id, email, name, phone, company, job_title,
                registration_type, metadata, payment_status, registration_date,
                payment_date, amount_paid
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (course_id, email) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(registration.registration_id)
        .bind(&registration.course_id)
        .bind(&registration.email)
        .bind(&registration.name)
        .bind(&registration.phone)
        .bind(&registration.company)
        .bind(&registration.job_title)
        .bind(registration.registration_type.as_str())
        .bind(Value::Object(registration.metadata.clone()))
        .bind(registration.payment_status.as_str())
        .bind(registration.registration_date)
        .bind(registration.payment_date)
        .bind(registration.amount_paid)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find registration by UUID.
    pub async fn find_entity_by_id(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_id");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations WHERE registration_id = $1
            "#,
        )
        .bind(registration_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_entity_by_course_and_email(
        &self,
        course_id: &str,
        email: &str,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registration_by_course_and_email");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations
            WHERE course_id = $1 AND email = $2
            "#,
        )
        .bind(course_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// All registrations for an email, oldest first.
    pub async fn find_entities_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_registrations_by_email");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            SELECT * FROM registrations
            WHERE email = $1
            ORDER BY registration_date ASC
            "#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Conditional `pending -> paid` update. `None` means the row was not pending.
    pub async fn update_paid_if_pending(
        &self,
        registration_id: Uuid,
        details: &PaymentDetails,
    ) -> Result<Option<RegistrationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("mark_registration_paid");
        let result = sqlx::query_as::<_, RegistrationEntity>(
            r#"
            UPDATE registrations SET
                payment_status = 'paid',
                payment_date = $2,
                stripe_session_id = $3,
                amount_paid = $4,
                currency = $5
            WHERE registration_id = $1 AND payment_status = 'pending'
            RETURNING *
            "#,
        )
        .bind(registration_id)
        .bind(details.paid_at)
        .bind(&details.session_id)
        .bind(details.amount_paid)
        .bind(&details.currency)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("ping");
        let result = sqlx::query("SELECT 1").execute(&self.pool).await;
        timer.record();
        result.map(|_| ())
    }
}

/// Maps driver errors onto the store's transient / permanent split.
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            if code == UNIQUE_VIOLATION {
                StoreError::Duplicate
            } else if is_transient_sqlstate(&code) {
                StoreError::Unavailable(err.to_string())
            } else {
                StoreError::Backend(err.to_string())
            }
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
        _ => StoreError::Backend(err.to_string()),
    }
}

/// Serialization failures, deadlocks, connection exceptions and admin shutdowns.
fn is_transient_sqlstate(code: &str) -> bool {
    code == "40001" || code == "40P01" || code.starts_with("08") || code.starts_with("57P")
}

fn to_domain(entity: RegistrationEntity) -> Result<Registration, StoreError> {
    Registration::try_from(entity).map_err(StoreError::Backend)
}

#[async_trait::async_trait]
impl RegistrationStore for RegistrationRepository {
    async fn insert_if_absent(&self, new: NewRegistration) -> Result<Registration, StoreError> {
        let registration = Registration::from_new(new, Utc::now());
        match self.insert(&registration).await.map_err(map_sqlx_error)? {
            Some(entity) => to_domain(entity),
            None => Err(StoreError::Duplicate),
        }
    }

    async fn find_by_id(&self, registration_id: Uuid) -> Result<Option<Registration>, StoreError> {
        self.find_entity_by_id(registration_id)
            .await
            .map_err(map_sqlx_error)?
            .map(to_domain)
            .transpose()
    }

    async fn find_by_course_and_email(
        &self,
        course_id: &str,
        email: &str,
    ) -> Result<Option<Registration>, StoreError> {
        self.find_entity_by_course_and_email(course_id, email)
            .await
            .map_err(map_sqlx_error)?
            .map(to_domain)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Registration>, StoreError> {
        self.find_entities_by_email(email)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    async fn mark_paid(
        &self,
        registration_id: Uuid,
        details: &PaymentDetails,
    ) -> Result<Option<Registration>, StoreError> {
        let updated = self
            .update_paid_if_pending(registration_id, details)
            .await
            .map_err(map_sqlx_error)?;
        if updated.is_none() {
            tracing::debug!(
                registration_id = %registration_id,
                "Conditional paid update matched no pending row"
            );
        }
        updated.map(to_domain).transpose()
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
