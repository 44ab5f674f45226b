//! Event bus publisher for domain events.
//!
//! Providers:
//! - log: writes the event as a structured log line (default)
//! - http: POSTs the JSON event to `event_bus.url`, signed with `X-Event-Signature`

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use domain::models::DomainEvent;
use domain::services::{EventPublisher, NotificationError};
use shared::crypto::sign_event_payload;

use crate::config::EventBusConfig;

/// Header carrying the HMAC-SHA256 of the request body.
pub const EVENT_SIGNATURE_HEADER: &str = "X-Event-Signature";

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("Unknown event bus provider: {0}")]
    UnknownProvider(String),

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to sign event: {0}")]
    Signing(String),

    #[error("Event delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("Event bus returned status {0}")]
    Rejected(u16),
}

impl From<EventBusError> for NotificationError {
    fn from(err: EventBusError) -> Self {
        NotificationError::Event(err.to_string())
    }
}

enum Provider {
    Log,
    Http { client: Client, url: String },
}

/// Publishes domain events to the configured provider.
pub struct EventBusPublisher {
    enabled: bool,
    provider: Provider,
    secret: Option<String>,
}

impl EventBusPublisher {
    pub fn new(config: &EventBusConfig) -> Result<Self, EventBusError> {
        let provider = match config.provider.as_str() {
            "log" => Provider::Log,
            "http" => Provider::Http {
                client: Client::builder()
                    .timeout(Duration::from_millis(config.timeout_ms))
                    .build()?,
                url: config.url.clone(),
            },
            other => return Err(EventBusError::UnknownProvider(other.to_string())),
        };

        Ok(Self {
            enabled: config.enabled,
            provider,
            secret: Some(config.secret.clone()).filter(|s| !s.is_empty()),
        })
    }

    pub async fn publish_event(&self, event: &DomainEvent) -> Result<(), EventBusError> {
        if !self.enabled {
            debug!(detail_type = %event.detail_type, "Event bus disabled, skipping publish");
            return Ok(());
        }

        match &self.provider {
            Provider::Log => {
                info!(
                    source = %event.source,
                    detail_type = %event.detail_type,
                    detail = %event.detail,
                    "Domain event"
                );
                Ok(())
            }
            Provider::Http { client, url } => {
                let body = serde_json::to_vec(event)?;
                let mut request = client
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, "application/json");
                if let Some(signature) = self.signature(&body)? {
                    request = request.header(EVENT_SIGNATURE_HEADER, signature);
                }

                let response = request.body(body).send().await?;
                let status = response.status();
                if !status.is_success() {
                    warn!(status = status.as_u16(), "Event bus rejected event");
                    return Err(EventBusError::Rejected(status.as_u16()));
                }

                info!(detail_type = %event.detail_type, "Event published");
                Ok(())
            }
        }
    }

    fn signature(&self, body: &[u8]) -> Result<Option<String>, EventBusError> {
        self.secret
            .as_deref()
            .map(|secret| {
                sign_event_payload(body, secret).map_err(|e| EventBusError::Signing(e.to_string()))
            })
            .transpose()
    }
}

#[async_trait::async_trait]
impl EventPublisher for EventBusPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), NotificationError> {
        self.publish_event(&event).await.map_err(Into::into)
    }
}
