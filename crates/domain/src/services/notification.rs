//! Best-effort notifications sent after registrations and payments.
//!
//! Nothing here can fail the calling request: every send runs under a timeout and
//! failures are logged and reported back in a [`DispatchReport`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::models::contact::ContactMessage;
use crate::models::event::DomainEvent;
use crate::models::registration::Registration;

use super::templates;

/// Email message to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient email address
    pub to: String,
    /// Recipient name (optional)
    pub to_name: Option<String>,
    pub subject: String,
    /// Plain text body
    pub body_text: String,
    /// HTML body (optional)
    pub body_html: Option<String>,
    pub reply_to: Option<String>,
}

/// Errors from the email and event collaborators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Event publish failed: {0}")]
    Event(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Sends a single email.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError>;
}

/// Publishes a domain event to the event bus.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), NotificationError>;
}

/// Side effect kinds, used as the `kind` metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    UserEmail,
    AdminEmail,
    Event,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::UserEmail => "user_email",
            NotificationKind::AdminEmail => "admin_email",
            NotificationKind::Event => "event",
        }
    }
}

/// Outcome of a dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<NotificationKind>,
    pub failed: Vec<NotificationKind>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, kind: NotificationKind, result: Option<Result<(), NotificationError>>) {
        match result {
            None => {}
            Some(Ok(())) => self.delivered.push(kind),
            Some(Err(_)) => self.failed.push(kind),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Admin recipient; admin notifications are skipped when unset.
    pub admin_email: Option<String>,
    pub event_source: String,
    /// Upper bound for each individual send.
    pub timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            admin_email: None,
            event_source: crate::models::event::DEFAULT_EVENT_SOURCE.to_string(),
            timeout: Duration::from_millis(3000),
        }
    }
}

/// Fans out user email, admin email and domain event concurrently.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    publisher: Arc<dyn EventPublisher>,
    settings: DispatchSettings,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        publisher: Arc<dyn EventPublisher>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            mailer,
            publisher,
            settings,
        }
    }

    /// Notifies the payer and admin and publishes the payment event.
    pub async fn payment_confirmed(&self, registration: &Registration) -> DispatchReport {
        let user = templates::payment_confirmation(registration);
        let admin = self
            .settings
            .admin_email
            .as_deref()
            .map(|to| templates::payment_admin_notice(registration, to));
        let event = DomainEvent::payment_successful(&self.settings.event_source, registration);

        let (user_result, admin_result, event_result) = tokio::join!(
            self.send_email(NotificationKind::UserEmail, user),
            self.send_optional(NotificationKind::AdminEmail, admin),
            self.publish(event),
        );

        let mut report = DispatchReport::default();
        report.record(NotificationKind::UserEmail, Some(user_result));
        report.record(NotificationKind::AdminEmail, admin_result);
        report.record(NotificationKind::Event, Some(event_result));
        self.log_report(registration, &report);
        report
    }

    /// Confirms a free livestream signup to the viewer and admin.
    pub async fn livestream_signup(&self, registration: &Registration) -> DispatchReport {
        let user = templates::livestream_confirmation(registration);
        let admin = self
            .settings
            .admin_email
            .as_deref()
            .map(|to| templates::livestream_admin_notice(registration, to));

        let (user_result, admin_result) = tokio::join!(
            self.send_email(NotificationKind::UserEmail, user),
            self.send_optional(NotificationKind::AdminEmail, admin),
        );

        let mut report = DispatchReport::default();
        report.record(NotificationKind::UserEmail, Some(user_result));
        report.record(NotificationKind::AdminEmail, admin_result);
        self.log_report(registration, &report);
        report
    }

    /// Forwards a contact form message to the admin.
    ///
    /// Unlike the other sends the error is returned, since delivering the message is the
    /// whole operation.
    pub async fn forward_contact(&self, contact: &ContactMessage) -> Result<(), NotificationError> {
        let admin = self
            .settings
            .admin_email
            .as_deref()
            .ok_or_else(|| NotificationError::Email("admin email is not configured".to_string()))?;

        self.send_email(
            NotificationKind::AdminEmail,
            templates::contact_admin_notice(contact, admin),
        )
        .await
    }

    async fn send_email(
        &self,
        kind: NotificationKind,
        message: EmailMessage,
    ) -> Result<(), NotificationError> {
        let result = match tokio::time::timeout(self.settings.timeout, self.mailer.send(message)).await
        {
            Ok(result) => result,
            Err(_) => Err(NotificationError::Timeout(self.settings.timeout)),
        };

        if let Err(e) = &result {
            tracing::warn!(kind = kind.as_str(), error = %e, "Email notification failed");
        }
        result
    }

    async fn send_optional(
        &self,
        kind: NotificationKind,
        message: Option<EmailMessage>,
    ) -> Option<Result<(), NotificationError>> {
        match message {
            Some(message) => Some(self.send_email(kind, message).await),
            None => {
                tracing::debug!(kind = kind.as_str(), "No recipient configured, skipping");
                None
            }
        }
    }

    async fn publish(&self, event: DomainEvent) -> Result<(), NotificationError> {
        let result =
            match tokio::time::timeout(self.settings.timeout, self.publisher.publish(event)).await {
                Ok(result) => result,
                Err(_) => Err(NotificationError::Timeout(self.settings.timeout)),
            };

        if let Err(e) = &result {
            tracing::warn!(kind = "event", error = %e, "Event publish failed");
        }
        result
    }

    fn log_report(&self, registration: &Registration, report: &DispatchReport) {
        if report.is_clean() {
            tracing::info!(
                registration_id = %registration.registration_id,
                delivered = report.delivered.len(),
                "Notifications dispatched"
            );
        } else {
            tracing::warn!(
                registration_id = %registration.registration_id,
                delivered = report.delivered.len(),
                failed = report.failed.len(),
                "Some notifications failed"
            );
        }
    }
}

/// Mailer that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    simulate_failure: bool,
    delay: Option<Duration>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose sends always fail.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// A mailer that sleeps before every send.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, address: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.to == address)
            .collect()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.simulate_failure {
            tracing::warn!(subject = %message.subject, "Recording mailer simulating failure");
            return Err(NotificationError::Email("Simulated failure".to_string()));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

/// Event publisher that records events instead of publishing them.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<DomainEvent>>,
    simulate_failure: bool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<DomainEvent> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), NotificationError> {
        if self.simulate_failure {
            return Err(NotificationError::Event("Simulated failure".to_string()));
        }

        if let Ok(mut published) = self.published.lock() {
            published.push(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registration::{
        NewRegistration, PaymentDetails, PaymentStatus, RegistrationType,
    };
    use chrono::Utc;
    use serde_json::Map;
    use uuid::Uuid;

    fn paid_registration() -> Registration {
        let mut registration = Registration::from_new(
            NewRegistration {
                registration_id: Uuid::new_v4(),
                course_id: "c1".to_string(),
                email: "a@x.com".to_string(),
                name: "A".to_string(),
                phone: "0412345678".to_string(),
                company: None,
                job_title: None,
                registration_type: RegistrationType::Course,
                metadata: Map::new(),
                payment_status: PaymentStatus::Pending,
                amount_paid: None,
            },
            Utc::now(),
        );
        registration.apply_payment(&PaymentDetails {
            session_id: "cs_1".to_string(),
            amount_paid: 100,
            currency: Some("aud".to_string()),
            paid_at: Utc::now(),
        });
        registration
    }

    fn settings() -> DispatchSettings {
        DispatchSettings {
            admin_email: Some("admin@example.com".to_string()),
            timeout: Duration::from_millis(200),
            ..DispatchSettings::default()
        }
    }

    #[tokio::test]
    async fn test_payment_confirmed_sends_everything_once() {
        let mailer = Arc::new(RecordingMailer::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = NotificationDispatcher::new(mailer.clone(), publisher.clone(), settings());

        let report = dispatcher.payment_confirmed(&paid_registration()).await;

        assert!(report.is_clean());
        assert_eq!(report.delivered.len(), 3);
        assert_eq!(mailer.sent_to("a@x.com").len(), 1);
        assert_eq!(mailer.sent_to("admin@example.com").len(), 1);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn test_email_failure_does_not_block_event() {
        let mailer = Arc::new(RecordingMailer::failing());
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = NotificationDispatcher::new(mailer, publisher.clone(), settings());

        let report = dispatcher.payment_confirmed(&paid_registration()).await;

        assert_eq!(
            report.failed,
            vec![NotificationKind::UserEmail, NotificationKind::AdminEmail]
        );
        assert_eq!(report.delivered, vec![NotificationKind::Event]);
        assert_eq!(publisher.published().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_mailer_times_out() {
        let mailer = Arc::new(RecordingMailer::slow(Duration::from_secs(5)));
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = NotificationDispatcher::new(mailer, publisher, settings());

        let started = std::time::Instant::now();
        let report = dispatcher.payment_confirmed(&paid_registration()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.failed.len(), 2);
    }

    #[tokio::test]
    async fn test_admin_skipped_without_address() {
        let mailer = Arc::new(RecordingMailer::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = NotificationDispatcher::new(
            mailer.clone(),
            publisher,
            DispatchSettings {
                admin_email: None,
                ..settings()
            },
        );

        let report = dispatcher.livestream_signup(&paid_registration()).await;

        assert!(report.is_clean());
        assert_eq!(report.delivered, vec![NotificationKind::UserEmail]);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_forward_contact_sets_reply_to() {
        let mailer = Arc::new(RecordingMailer::new());
        let dispatcher =
            NotificationDispatcher::new(mailer.clone(), Arc::new(RecordingPublisher::new()), settings());

        let contact = ContactMessage {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            mobile: "0400000000".to_string(),
            message: "Hello".to_string(),
        };
        dispatcher.forward_contact(&contact).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "admin@example.com");
        assert_eq!(sent[0].reply_to.as_deref(), Some("sam@example.com"));
    }

    #[tokio::test]
    async fn test_forward_contact_propagates_failure() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(RecordingMailer::failing()),
            Arc::new(RecordingPublisher::new()),
            settings(),
        );
        let contact = ContactMessage {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            mobile: "0400000000".to_string(),
            message: "Hello".to_string(),
        };

        assert!(dispatcher.forward_contact(&contact).await.is_err());
    }
}
