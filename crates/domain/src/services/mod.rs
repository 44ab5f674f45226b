//! Domain services for the course funnel.
//!
//! Services contain business logic that operates on domain models. External systems
//! (storage, email, event bus) are reached only through the traits defined here.

pub mod intake;
pub mod notification;
pub mod payment_webhook;
pub mod reconciliation;
pub mod retry;
pub mod store;
pub mod templates;

pub use intake::{validate_contact, IntakeSettings, LivestreamSignup, RegistrationIntake};
pub use notification::{
    DispatchReport, DispatchSettings, EmailMessage, EventPublisher, Mailer, NotificationDispatcher,
    NotificationError, NotificationKind, RecordingMailer, RecordingPublisher,
};
pub use payment_webhook::{PaymentWebhookProcessor, WebhookOutcome, WebhookSettings};
pub use reconciliation::{PaymentReconciler, ReconciliationOutcome};
pub use retry::RetryPolicy;
pub use store::{InMemoryRegistrationStore, RegistrationStore, StoreError};
