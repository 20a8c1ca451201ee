//! Reactions to other services' lifecycle events.
//!
//! Both handlers filter on current state, so redelivering an event only
//! repeats work that is already done.

use super::{NumberHandler, DEFAULT_PAGE_SIZE};
use crate::error::NumberResult;
use number_store::{format_time, NumberFilter};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Customer projection published by the customer service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub detail: String,
}

/// Flow projection published by the flow service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    #[serde(default)]
    pub customer_id: Uuid,
    #[serde(default, rename = "type")]
    pub flow_type: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
enum FlowReference {
    Call,
    Message,
}

impl NumberHandler {
    /// Delete every live number of a deleted customer. Failures are
    /// logged and skipped.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn event_customer_deleted(&self, customer: &Customer) -> NumberResult<()> {
        let filter = NumberFilter::active().with_customer_id(customer.id);
        let mut token: Option<String> = None;
        let mut deleted = 0usize;

        loop {
            let page = self
                .list(DEFAULT_PAGE_SIZE, token.as_deref(), &filter)
                .await?;

            for number in &page {
                match self.delete(&number.id).await {
                    Ok(_) => deleted += 1,
                    Err(e) => error!("Could not delete {} of customer {}: {}", number.id, customer.id, e),
                }
            }

            if (page.len() as u64) < DEFAULT_PAGE_SIZE {
                break;
            }
            token = match page.last().and_then(|n| n.tm_create) {
                Some(tm_create) => Some(format_time(&tm_create)),
                None => break,
            };
        }

        info!("Deleted {} numbers of customer {}", deleted, customer.id);
        Ok(())
    }

    /// Clear references to a deleted flow from every live number.
    #[instrument(skip(self, flow), fields(flow_id = %flow.id))]
    pub async fn event_flow_deleted(&self, flow: &Flow) -> NumberResult<()> {
        let call = self.clear_flow_reference(flow.id, FlowReference::Call).await?;
        let message = self
            .clear_flow_reference(flow.id, FlowReference::Message)
            .await?;

        info!(
            "Cleared flow {} from {} call and {} message references",
            flow.id, call, message
        );
        Ok(())
    }

    /// Each pass re-queries from now, since cleared numbers drop out of
    /// the filter.
    async fn clear_flow_reference(&self, flow_id: Uuid, reference: FlowReference) -> NumberResult<usize> {
        let filter = match reference {
            FlowReference::Call => NumberFilter::active().with_call_flow_id(flow_id),
            FlowReference::Message => NumberFilter::active().with_message_flow_id(flow_id),
        };
        let mut cleared = 0usize;

        loop {
            let page = self.list(DEFAULT_PAGE_SIZE, None, &filter).await?;

            let mut page_cleared = 0usize;
            for number in &page {
                let (call_flow_id, message_flow_id) = match reference {
                    FlowReference::Call => (Uuid::nil(), number.message_flow_id),
                    FlowReference::Message => (number.call_flow_id, Uuid::nil()),
                };
                match self
                    .update_flow_id(&number.id, call_flow_id, message_flow_id)
                    .await
                {
                    Ok(_) => page_cleared += 1,
                    Err(e) => error!("Could not clear flow {} from {}: {}", flow_id, number.id, e),
                }
            }
            cleared += page_cleared;

            if (page.len() as u64) < DEFAULT_PAGE_SIZE {
                break;
            }
            if page_cleared == 0 {
                warn!("Could not clear any number on this page, stopping");
                break;
            }
        }

        Ok(cleared)
    }
}
