//! Balance gate consulted before purchases and renewals.

use async_trait::async_trait;
use billing_client::{BillingClient, BillingError, ReferenceType};
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceChecker: Send + Sync {
    /// Whether the customer can pay for `count` units of `reference_type`.
    async fn is_valid_balance(
        &self,
        customer_id: Uuid,
        reference_type: ReferenceType,
        country: &str,
        count: u32,
    ) -> Result<bool, BillingError>;
}

#[async_trait]
impl BalanceChecker for BillingClient {
    async fn is_valid_balance(
        &self,
        customer_id: Uuid,
        reference_type: ReferenceType,
        country: &str,
        count: u32,
    ) -> Result<bool, BillingError> {
        BillingClient::is_valid_balance(self, customer_id, reference_type, country, count).await
    }
}
