//! Billing API types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of billable resource a balance check is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Call,
    Sms,
    Number,
}

#[derive(Debug, Clone, Serialize)]
pub struct IsValidBalanceRequest {
    pub customer_id: Uuid,
    pub reference_type: ReferenceType,
    /// Empty when the charge does not depend on a country.
    pub country: String,
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IsValidBalanceResponse {
    pub valid: bool,
}
