//! Registration storage abstraction.
//!
//! The store is the only place concurrency is resolved: `insert_if_absent` and
//! `mark_paid` are conditional writes, so racing requests cannot both succeed.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::registration::{NewRegistration, PaymentDetails, PaymentStatus, Registration};

/// Storage failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("A registration already exists for this course and email")]
    Duplicate,

    /// Transient failure (pool exhausted, connection reset); worth retrying.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Permanent failure; retrying will not help.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Durable keyed storage of registrations.
#[async_trait::async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Inserts a registration unless one exists for the same `(course_id, email)`.
    async fn insert_if_absent(&self, new: NewRegistration) -> Result<Registration, StoreError>;

    async fn find_by_id(&self, registration_id: Uuid) -> Result<Option<Registration>, StoreError>;

    async fn find_by_course_and_email(
        &self,
        course_id: &str,
        email: &str,
    ) -> Result<Option<Registration>, StoreError>;

    /// All registrations for a normalized email, oldest first.
    async fn find_by_email(&self, email: &str) -> Result<Vec<Registration>, StoreError>;

    /// Transitions a registration to paid if it is still pending.
    ///
    /// Returns `None` when the record is missing or no longer pending.
    async fn mark_paid(
        &self,
        registration_id: Uuid,
        details: &PaymentDetails,
    ) -> Result<Option<Registration>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    records: HashMap<Uuid, Registration>,
    failing_writes: u32,
}

/// Mutex-guarded store used by tests and local runs without a database.
#[derive(Debug, Default)]
pub struct InMemoryRegistrationStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` writes fail with a transient error.
    pub fn fail_next_writes(&self, count: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_writes = count;
        }
    }

    /// Snapshot of every stored registration.
    pub fn all(&self) -> Vec<Registration> {
        self.state
            .lock()
            .map(|state| state.records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }
}

impl InMemoryState {
    fn take_write_failure(&mut self) -> Result<(), StoreError> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn insert_if_absent(&self, new: NewRegistration) -> Result<Registration, StoreError> {
        let mut state = self.lock()?;
        state.take_write_failure()?;

        let exists = state
            .records
            .values()
            .any(|r| r.course_id == new.course_id && r.email == new.email);
        if exists || state.records.contains_key(&new.registration_id) {
            return Err(StoreError::Duplicate);
        }

        let registration = Registration::from_new(new, Utc::now());
        state
            .records
            .insert(registration.registration_id, registration.clone());
        Ok(registration)
    }

    async fn find_by_id(&self, registration_id: Uuid) -> Result<Option<Registration>, StoreError> {
        Ok(self.lock()?.records.get(&registration_id).cloned())
    }

    async fn find_by_course_and_email(
        &self,
        course_id: &str,
        email: &str,
    ) -> Result<Option<Registration>, StoreError> {
        Ok(self
            .lock()?
            .records
            .values()
            .find(|r| r.course_id == course_id && r.email == email)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<Registration>, StoreError> {
        let mut matches: Vec<Registration> = self
            .lock()?
            .records
            .values()
            .filter(|r| r.email == email)
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.registration_date);
        Ok(matches)
    }

    async fn mark_paid(
        &self,
        registration_id: Uuid,
        details: &PaymentDetails,
    ) -> Result<Option<Registration>, StoreError> {
        let mut state = self.lock()?;
        state.take_write_failure()?;

        match state.records.get_mut(&registration_id) {
            Some(record) if record.payment_status == PaymentStatus::Pending => {
                record.apply_payment(details);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
