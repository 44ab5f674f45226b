//! Domain layer for the course funnel backend.
//!
//! This crate contains:
//! - Domain models (Registration, payment provider events, domain events)
//! - Business logic services (intake, webhook processing, reconciliation, notifications)
//! - Storage and delivery traits implemented by the outer crates
//! - Domain error types

pub mod errors;
pub mod models;
pub mod services;

pub use errors::{FieldError, RegistrationError};
