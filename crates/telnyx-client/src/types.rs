//! Telnyx v2 API types.

use serde::{Deserialize, Serialize};

/// Envelope for endpoints returning a single object.
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Envelope for endpoints returning a collection.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// A number offered for purchase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailablePhoneNumber {
    pub phone_number: String,
    pub record_type: String,
    pub vanity_format: String,
    pub best_effort: bool,
    pub quickship: bool,
    pub reservable: bool,
    pub region_information: Vec<RegionInformation>,
    pub cost_information: Option<CostInformation>,
    pub features: Vec<Feature>,
}

impl AvailablePhoneNumber {
    /// Region name for a region type such as `state`, `rate_center` or
    /// `country_code`.
    pub fn region(&self, region_type: &str) -> Option<&str> {
        self.region_information
            .iter()
            .find(|r| r.region_type == region_type)
            .map(|r| r.region_name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionInformation {
    pub region_type: String,
    pub region_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostInformation {
    pub upfront_cost: String,
    pub monthly_cost: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub name: String,
}

/// Request body for `POST /number_orders`.
#[derive(Debug, Clone, Serialize)]
pub struct NumberOrderRequest {
    pub phone_numbers: Vec<OrderPhoneNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messaging_profile_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPhoneNumber {
    pub phone_number: String,
}

/// A number order. Numbers in the order are provisioned asynchronously.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NumberOrder {
    pub id: String,
    pub record_type: String,
    pub status: String,
    pub phone_numbers_count: u32,
    pub phone_numbers: Vec<OrderedPhoneNumber>,
    pub connection_id: Option<String>,
    pub messaging_profile_id: Option<String>,
    pub customer_reference: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderedPhoneNumber {
    pub id: String,
    pub phone_number: String,
    pub status: String,
    pub record_type: String,
}

/// A number owned by the account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PhoneNumber {
    pub id: String,
    pub record_type: String,
    pub phone_number: String,
    pub status: String,
    pub tags: Vec<String>,
    pub connection_id: Option<String>,
    pub connection_name: Option<String>,
    pub messaging_profile_id: Option<String>,
    pub billing_group_id: Option<String>,
    pub t38_fax_gateway_enabled: bool,
    pub emergency_enabled: bool,
    pub emergency_address_id: Option<String>,
    pub call_forwarding_enabled: bool,
    pub purchased_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Request body for `PATCH /phone_numbers/{id}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePhoneNumberRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_reference: Option<String>,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorResponse {
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiErrorDetail {
    pub code: String,
    pub title: String,
    pub detail: String,
}

impl ErrorResponse {
    /// Human readable summary of all errors in the body.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| {
                if e.detail.is_empty() {
                    format!("{} {}", e.code, e.title)
                } else {
                    format!("{} {}: {}", e.code, e.title, e.detail)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
