//! Outbound number events.
//!
//! Customer-facing webhook events carry the owning customer id; platform
//! events (renewals) do not.

use crate::error::NotifyError;
use async_trait::async_trait;
use number_store::Number;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "number_created")]
    Created,
    #[serde(rename = "number_updated")]
    Updated,
    #[serde(rename = "number_deleted")]
    Deleted,
    #[serde(rename = "number_renewed")]
    Renewed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "number_created",
            EventType::Updated => "number_updated",
            EventType::Deleted => "number_deleted",
            EventType::Renewed => "number_renewed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event envelope posted to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<Uuid>,
    pub data: Number,
}

impl NumberEvent {
    /// Event delivered to the customer owning the number.
    pub fn webhook(event_type: EventType, number: &Number) -> Self {
        Self {
            event_type,
            customer_id: Some(number.customer_id),
            data: number.clone(),
        }
    }

    /// Platform-internal event.
    pub fn platform(event_type: EventType, number: &Number) -> Self {
        Self {
            event_type,
            customer_id: None,
            data: number.clone(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: &NumberEvent) -> Result<(), NotifyError>;
}

/// Posts events as JSON to a webhook endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, event), fields(event_type = %event.event_type, id = %event.data.id))]
    async fn publish(&self, event: &NumberEvent) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(event).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Webhook rejected {}: {} {}", event.event_type, status, message);
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!("Published {} for {}", event.event_type, event.data.id);
        Ok(())
    }
}

/// Writes events to the log. Used when no webhook endpoint is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, event: &NumberEvent) -> Result<(), NotifyError> {
        info!(
            event_type = %event.event_type,
            id = %event.data.id,
            number = %event.data.number,
            "Number event"
        );
        Ok(())
    }
}
