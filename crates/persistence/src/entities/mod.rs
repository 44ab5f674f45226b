//! Database entity definitions.

pub mod registration;

pub use registration::RegistrationEntity;
