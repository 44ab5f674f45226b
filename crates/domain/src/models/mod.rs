//! Domain models for the course funnel.

pub mod contact;
pub mod event;
pub mod payment;
pub mod registration;

pub use contact::{ContactMessage, ContactRequest};
pub use event::{DomainEvent, PaymentSucceeded};
pub use payment::{PaymentConfirmation, ProviderEvent, ProviderNotification};
pub use registration::{
    LivestreamRequest, NewRegistration, PaymentDetails, PaymentStatus, Registration,
    RegistrationRequest, RegistrationResponse, RegistrationType,
};
