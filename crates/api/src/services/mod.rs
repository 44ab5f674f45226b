//! External service integrations.

pub mod email;
pub mod event_bus;

pub use email::{EmailError, EmailService};
pub use event_bus::{EventBusError, EventBusPublisher};
