//! Repository implementations.

pub mod registration;

pub use registration::RegistrationRepository;
