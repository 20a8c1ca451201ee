//! Billing HTTP client.

use crate::error::BillingError;
use crate::types::*;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Client for the billing service's account endpoints.
#[derive(Clone)]
pub struct BillingClient {
    client: Client,
    base_url: String,
}

impl BillingClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BillingError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Ask whether the customer can afford `count` units of a resource.
    #[instrument(skip(self))]
    pub async fn is_valid_balance(
        &self,
        customer_id: Uuid,
        reference_type: ReferenceType,
        country: &str,
        count: u32,
    ) -> Result<bool, BillingError> {
        let request = IsValidBalanceRequest {
            customer_id,
            reference_type,
            country: country.to_string(),
            count,
        };

        let response = self
            .client
            .post(format!("{}/v1/accounts/is_valid_balance", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Balance check failed: {} {}", status, message);
            return Err(BillingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let result: IsValidBalanceResponse = serde_json::from_str(&body)?;
        debug!("Balance check for {}: {}", customer_id, result.valid);
        Ok(result.valid)
    }
}
