//! HTTP route handlers.

pub mod contact;
pub mod health;
pub mod livestream;
pub mod registrations;
pub mod stripe_webhook;
