//! Email service for registration confirmations and admin notices.
//!
//! Supports multiple email providers:
//! - console: Logs emails to console (for development)
//! - sendgrid: SendGrid v3 mail send API

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use domain::services::{EmailMessage, Mailer, NotificationError};

use crate::config::EmailConfig;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Upper bound on a provider HTTP call; the dispatcher applies its own, shorter timeout.
const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Email service errors.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

impl From<EmailError> for NotificationError {
    fn from(err: EmailError) -> Self {
        NotificationError::Email(err.to_string())
    }
}

/// Email service for sending emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: Client,
}

impl EmailService {
    /// Create a new email service with the given configuration.
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| EmailError::ProviderError(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an email message.
    ///
    /// A disabled service succeeds without sending anything.
    pub async fn send_message(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Console provider - logs email to stdout.
    async fn send_console(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            subject = %message.subject,
            from = %self.config.sender_email,
            reply_to = ?message.reply_to,
            "Email (console provider)"
        );
        debug!(
            to = %message.to,
            to_name = ?message.to_name,
            body_text = %message.body_text,
            body_html_length = message.body_html.as_ref().map(|h| h.len()),
            "Email body"
        );

        Ok(())
    }

    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let body = self.sendgrid_payload(&message);

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            info!(subject = %message.subject, "Email sent via SendGrid");
            debug!(to = %message.to, "SendGrid recipient");
            Ok(())
        } else {
            let error_body = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                error = %error_body,
                "SendGrid API error"
            );
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }

    /// Builds the SendGrid v3 request body.
    fn sendgrid_payload(&self, message: &EmailMessage) -> Value {
        let mut recipient = json!({ "email": message.to });
        if let Some(name) = &message.to_name {
            recipient["name"] = json!(name);
        }

        let mut content = vec![json!({
            "type": "text/plain",
            "value": message.body_text
        })];
        if let Some(html) = &message.body_html {
            content.push(json!({
                "type": "text/html",
                "value": html
            }));
        }

        let mut body = json!({
            "personalizations": [{ "to": [recipient] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": content
        });

        if let Some(reply_to) = &message.reply_to {
            body["reply_to"] = json!({ "email": reply_to });
        }

        body
    }
}

#[async_trait::async_trait]
impl Mailer for EmailService {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        self.send_message(message).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            provider: "console".to_string(),
            sendgrid_api_key: String::new(),
            sender_email: "test@example.com".to_string(),
            sender_name: "Test".to_string(),
        }
    }

    fn message() -> EmailMessage {
        EmailMessage {
            to: "user@example.com".to_string(),
            to_name: Some("Test User".to_string()),
            subject: "Test Subject".to_string(),
            body_text: "Test body".to_string(),
            body_html: Some("<p>Test body</p>".to_string()),
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_send_console_email() {
        let service = EmailService::new(test_config()).unwrap();
        assert!(service.is_enabled());
        assert!(service.send_message(message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_disabled_silently_succeeds() {
        let mut config = test_config();
        config.enabled = false;
        config.provider = "carrier-pigeon".to_string();
        let service = EmailService::new(config).unwrap();

        assert!(service.send_message(message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_provider_not_configured() {
        let mut config = test_config();
        config.provider = "carrier-pigeon".to_string();
        let service = EmailService::new(config).unwrap();

        let err = service.send_message(message()).await.unwrap_err();
        assert!(matches!(err, EmailError::NotConfigured));
    }

    #[tokio::test]
    async fn test_sendgrid_without_key_not_configured() {
        let mut config = test_config();
        config.provider = "sendgrid".to_string();
        let service = EmailService::new(config).unwrap();

        let err = Mailer::send(&service, message()).await.unwrap_err();
        assert_eq!(
            err,
            NotificationError::Email("Email service not configured".to_string())
        );
    }

    #[test]
    fn test_sendgrid_payload_includes_html_and_reply_to() {
        let service = EmailService::new(test_config()).unwrap();
        let mut msg = message();
        msg.reply_to = Some("sender@example.com".to_string());

        let body = service.sendgrid_payload(&msg);

        assert_eq!(body["personalizations"][0]["to"][0]["email"], "user@example.com");
        assert_eq!(body["personalizations"][0]["to"][0]["name"], "Test User");
        assert_eq!(body["content"][0]["type"], "text/plain");
        assert_eq!(body["content"][1]["type"], "text/html");
        assert_eq!(body["reply_to"]["email"], "sender@example.com");
        assert_eq!(body["from"]["email"], "test@example.com");
    }

    #[test]
    fn test_sendgrid_payload_plain_only() {
        let service = EmailService::new(test_config()).unwrap();
        let mut msg = message();
        msg.body_html = None;
        msg.to_name = None;

        let body = service.sendgrid_payload(&msg);

        assert_eq!(body["content"].as_array().unwrap().len(), 1);
        assert!(body.get("reply_to").is_none());
        assert!(body["personalizations"][0]["to"][0].get("name").is_none());
    }
}
