//! Number record, typed fields, filters and patches.

use crate::error::StoreError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Storage format for timestamps. Fixed width so that text comparison
/// matches chronological order.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a timestamp the way it is persisted and used as a page token.
pub fn format_time(tm: &DateTime<Utc>) -> String {
    tm.format(TIME_FORMAT).to_string()
}

/// Parse a persisted timestamp.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp {:?}: {}", value, e)))
}

/// Carrier that supplied a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    /// Not backed by a carrier (virtual or externally managed).
    #[default]
    None,
    Telnyx,
    Twilio,
    Messagebird,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::None => "none",
            ProviderName::Telnyx => "telnyx",
            ProviderName::Twilio => "twilio",
            ProviderName::Messagebird => "messagebird",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(ProviderName::None),
            "telnyx" => Ok(ProviderName::Telnyx),
            "twilio" => Ok(ProviderName::Twilio),
            "messagebird" => Ok(ProviderName::Messagebird),
            other => Err(StoreError::InvalidData(format!("unknown provider name: {}", other))),
        }
    }
}

/// Kind of number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberType {
    /// Real PSTN number purchased from a carrier.
    #[default]
    Normal,
    /// Synthetic number used for internal routing only.
    Virtual,
}

impl NumberType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberType::Normal => "normal",
            NumberType::Virtual => "virtual",
        }
    }
}

impl FromStr for NumberType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(NumberType::Normal),
            "virtual" => Ok(NumberType::Virtual),
            other => Err(StoreError::InvalidData(format!("unknown number type: {}", other))),
        }
    }
}

/// Lifecycle status of a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStatus {
    #[default]
    Active,
    Deleted,
}

impl NumberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberStatus::Active => "active",
            NumberStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for NumberStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(NumberStatus::Active),
            "deleted" => Ok(NumberStatus::Deleted),
            other => Err(StoreError::InvalidData(format!("unknown number status: {}", other))),
        }
    }
}

/// A telephony number owned by a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Number {
    pub id: Uuid,
    pub customer_id: Uuid,

    pub number: String,
    #[serde(rename = "type", default)]
    pub number_type: NumberType,

    /// Nil when unset.
    pub call_flow_id: Uuid,
    /// Nil when unset.
    pub message_flow_id: Uuid,

    pub name: String,
    pub detail: String,

    pub provider_name: ProviderName,
    pub provider_reference_id: String,

    pub status: NumberStatus,
    pub t38_enabled: bool,
    pub emergency_enabled: bool,

    pub tm_purchase: Option<DateTime<Utc>>,
    pub tm_renew: Option<DateTime<Utc>>,
    pub tm_create: Option<DateTime<Utc>>,
    pub tm_update: Option<DateTime<Utc>>,
    pub tm_delete: Option<DateTime<Utc>>,
}

impl Number {
    /// A new active record with nil references and no timestamps.
    pub fn new(id: Uuid, customer_id: Uuid, number: impl Into<String>) -> Self {
        Self {
            id,
            customer_id,
            number: number.into(),
            number_type: NumberType::Normal,
            call_flow_id: Uuid::nil(),
            message_flow_id: Uuid::nil(),
            name: String::new(),
            detail: String::new(),
            provider_name: ProviderName::None,
            provider_reference_id: String::new(),
            status: NumberStatus::Active,
            t38_enabled: false,
            emergency_enabled: false,
            tm_purchase: None,
            tm_renew: None,
            tm_create: None,
            tm_update: None,
            tm_delete: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == NumberStatus::Deleted || self.tm_delete.is_some()
    }

    pub fn is_virtual(&self) -> bool {
        self.number_type == NumberType::Virtual
    }
}

/// Persisted columns. Names match the column names exactly.
///
/// `Deleted` is a pseudo column usable only as a filter; it tests
/// whether `tm_delete` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    CustomerId,
    Number,
    Type,
    CallFlowId,
    MessageFlowId,
    Name,
    Detail,
    ProviderName,
    ProviderReferenceId,
    Status,
    T38Enabled,
    EmergencyEnabled,
    TmPurchase,
    TmRenew,
    TmCreate,
    TmUpdate,
    TmDelete,
    Deleted,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::CustomerId => "customer_id",
            Field::Number => "number",
            Field::Type => "type",
            Field::CallFlowId => "call_flow_id",
            Field::MessageFlowId => "message_flow_id",
            Field::Name => "name",
            Field::Detail => "detail",
            Field::ProviderName => "provider_name",
            Field::ProviderReferenceId => "provider_reference_id",
            Field::Status => "status",
            Field::T38Enabled => "t38_enabled",
            Field::EmergencyEnabled => "emergency_enabled",
            Field::TmPurchase => "tm_purchase",
            Field::TmRenew => "tm_renew",
            Field::TmCreate => "tm_create",
            Field::TmUpdate => "tm_update",
            Field::TmDelete => "tm_delete",
            Field::Deleted => "deleted",
        }
    }

    /// Fields a partial update may touch.
    pub fn is_updatable(&self) -> bool {
        matches!(
            self,
            Field::CallFlowId | Field::MessageFlowId | Field::Name | Field::Detail | Field::TmRenew
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s {
            "id" => Field::Id,
            "customer_id" => Field::CustomerId,
            "number" => Field::Number,
            "type" => Field::Type,
            "call_flow_id" => Field::CallFlowId,
            "message_flow_id" => Field::MessageFlowId,
            "name" => Field::Name,
            "detail" => Field::Detail,
            "provider_name" => Field::ProviderName,
            "provider_reference_id" => Field::ProviderReferenceId,
            "status" => Field::Status,
            "t38_enabled" => Field::T38Enabled,
            "emergency_enabled" => Field::EmergencyEnabled,
            "tm_purchase" => Field::TmPurchase,
            "tm_renew" => Field::TmRenew,
            "tm_create" => Field::TmCreate,
            "tm_update" => Field::TmUpdate,
            "tm_delete" => Field::TmDelete,
            "deleted" => Field::Deleted,
            other => return Err(StoreError::InvalidData(format!("unknown field: {}", other))),
        };
        Ok(field)
    }
}

/// Partial update of a number. Only allow-listed fields exist here, and
/// deserialisation rejects any other key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumberPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_flow_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_flow_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tm_renew: Option<DateTime<Utc>>,
}

impl NumberPatch {
    /// Parse a patch from a JSON object, rejecting keys outside the allow-list.
    pub fn from_json(value: serde_json::Value) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::InvalidData(e.to_string()))
    }

    pub fn info(
        call_flow_id: Uuid,
        message_flow_id: Uuid,
        name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            call_flow_id: Some(call_flow_id),
            message_flow_id: Some(message_flow_id),
            name: Some(name.into()),
            detail: Some(detail.into()),
            tm_renew: None,
        }
    }

    pub fn flow_ids(call_flow_id: Uuid, message_flow_id: Uuid) -> Self {
        Self {
            call_flow_id: Some(call_flow_id),
            message_flow_id: Some(message_flow_id),
            ..Default::default()
        }
    }

    pub fn renew(tm_renew: DateTime<Utc>) -> Self {
        Self {
            tm_renew: Some(tm_renew),
            ..Default::default()
        }
    }

    /// Fields this patch sets, paired with their column encoding.
    pub fn values(&self) -> Vec<(Field, String)> {
        let mut values = Vec::new();
        if let Some(call_flow_id) = self.call_flow_id {
            values.push((Field::CallFlowId, call_flow_id.to_string()));
        }
        if let Some(message_flow_id) = self.message_flow_id {
            values.push((Field::MessageFlowId, message_flow_id.to_string()));
        }
        if let Some(name) = &self.name {
            values.push((Field::Name, name.clone()));
        }
        if let Some(detail) = &self.detail {
            values.push((Field::Detail, detail.clone()));
        }
        if let Some(tm_renew) = &self.tm_renew {
            values.push((Field::TmRenew, format_time(tm_renew)));
        }
        values
    }

    /// Fields this patch sets.
    pub fn fields(&self) -> Vec<Field> {
        self.values().into_iter().map(|(field, _)| field).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Typed list filter. Unset members do not constrain the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberFilter {
    pub customer_id: Option<Uuid>,
    pub number: Option<String>,
    pub number_type: Option<NumberType>,
    pub call_flow_id: Option<Uuid>,
    pub message_flow_id: Option<Uuid>,
    pub provider_name: Option<ProviderName>,
    pub status: Option<NumberStatus>,
    pub deleted: Option<bool>,
}

impl NumberFilter {
    /// Filter matching only non-deleted rows.
    pub fn active() -> Self {
        Self {
            deleted: Some(false),
            ..Default::default()
        }
    }

    pub fn with_customer_id(mut self, customer_id: Uuid) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    pub fn with_type(mut self, number_type: NumberType) -> Self {
        self.number_type = Some(number_type);
        self
    }

    pub fn with_call_flow_id(mut self, call_flow_id: Uuid) -> Self {
        self.call_flow_id = Some(call_flow_id);
        self
    }

    pub fn with_message_flow_id(mut self, message_flow_id: Uuid) -> Self {
        self.message_flow_id = Some(message_flow_id);
        self
    }

    pub fn with_status(mut self, status: NumberStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Build a filter from `field=value` pairs, e.g. decoded query
    /// parameters. The fields matched below are the filterable set; any
    /// other key is rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            let field = Field::from_str(key.as_ref())?;
            let value = value.as_ref();
            match field {
                Field::CustomerId => filter.customer_id = Some(Uuid::parse_str(value)?),
                Field::Number => filter.number = Some(value.to_string()),
                Field::Type => filter.number_type = Some(value.parse()?),
                Field::CallFlowId => filter.call_flow_id = Some(Uuid::parse_str(value)?),
                Field::MessageFlowId => filter.message_flow_id = Some(Uuid::parse_str(value)?),
                Field::ProviderName => filter.provider_name = Some(value.parse()?),
                Field::Status => filter.status = Some(value.parse()?),
                Field::Deleted => {
                    filter.deleted = Some(value.parse().map_err(|_| {
                        StoreError::InvalidData(format!("invalid boolean for deleted: {}", value))
                    })?)
                }
                other => {
                    return Err(StoreError::InvalidData(format!(
                        "field is not filterable: {}",
                        other
                    )))
                }
            }
        }
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_format_round_trip() {
        let tm = Utc.with_ymd_and_hms(2021, 2, 26, 18, 26, 49).unwrap();
        let formatted = format_time(&tm);
        assert_eq!(formatted, "2021-02-26 18:26:49.000000");
        assert_eq!(parse_time(&formatted).unwrap(), tm);
    }

    #[test]
    fn test_time_format_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2021, 2, 26, 9, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2021, 2, 26, 10, 0, 0).unwrap();
        assert!(format_time(&earlier) < format_time(&later));
    }

    #[test]
    fn test_parse_time_invalid() {
        assert!(parse_time("not a time").is_err());
    }

    #[test]
    fn test_provider_name_serialization() {
        let json = serde_json::to_string(&ProviderName::Telnyx).unwrap();
        assert_eq!(json, "\"telnyx\"");
        assert_eq!("twilio".parse::<ProviderName>().unwrap(), ProviderName::Twilio);
        assert_eq!("".parse::<ProviderName>().unwrap(), ProviderName::None);
        assert!("vonage".parse::<ProviderName>().is_err());
    }

    #[test]
    fn test_number_serialization_uses_type_key() {
        let mut number = Number::new(Uuid::new_v4(), Uuid::new_v4(), "+999001000001");
        number.number_type = NumberType::Virtual;

        let json = serde_json::to_value(&number).unwrap();
        assert_eq!(json["type"], "virtual");
        assert_eq!(json["status"], "active");
        assert_eq!(json["call_flow_id"], "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_field_names_match_columns() {
        for name in ["customer_id", "call_flow_id", "message_flow_id", "tm_renew", "deleted"] {
            let field: Field = name.parse().unwrap();
            assert_eq!(field.as_str(), name);
        }
        assert!("password".parse::<Field>().is_err());
    }

    #[test]
    fn test_patch_only_sets_updatable_fields() {
        let full = NumberPatch {
            call_flow_id: Some(Uuid::new_v4()),
            message_flow_id: Some(Uuid::new_v4()),
            name: Some("name".into()),
            detail: Some("detail".into()),
            tm_renew: Some(Utc.with_ymd_and_hms(2021, 2, 26, 18, 26, 49).unwrap()),
        };

        let values = full.values();
        assert_eq!(values.len(), 5);
        assert!(values.iter().all(|(field, _)| field.is_updatable()));
        assert!(values.contains(&(Field::TmRenew, "2021-02-26 18:26:49.000000".to_string())));
    }

    #[test]
    fn test_updatable_allow_list() {
        assert!(Field::Name.is_updatable());
        assert!(Field::TmRenew.is_updatable());
        assert!(!Field::CustomerId.is_updatable());
        assert!(!Field::Status.is_updatable());
        assert!(!Field::ProviderReferenceId.is_updatable());
    }

    #[test]
    fn test_patch_rejects_unknown_keys() {
        let result = NumberPatch::from_json(serde_json::json!({
            "name": "new name",
            "customer_id": "8290e0be-7905-11eb-90c7-d3d5addc947a"
        }));
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_patch_from_json() {
        let patch = NumberPatch::from_json(serde_json::json!({
            "name": "update name",
            "detail": "update detail"
        }))
        .unwrap();

        assert_eq!(patch.name.as_deref(), Some("update name"));
        assert_eq!(patch.fields(), vec![Field::Name, Field::Detail]);
        assert!(!patch.is_empty());
        assert!(NumberPatch::default().is_empty());
    }

    #[test]
    fn test_filter_from_pairs() {
        let filter = NumberFilter::from_pairs([
            ("customer_id", "bfc9a3de-eca8-11ee-967c-87c3c0ddb3d2"),
            ("deleted", "false"),
        ])
        .unwrap();

        assert_eq!(
            filter.customer_id,
            Some(Uuid::parse_str("bfc9a3de-eca8-11ee-967c-87c3c0ddb3d2").unwrap())
        );
        assert_eq!(filter.deleted, Some(false));
    }

    #[test]
    fn test_filter_from_pairs_rejects_unfilterable() {
        assert!(NumberFilter::from_pairs([("detail", "x")]).is_err());
        assert!(NumberFilter::from_pairs([("unknown", "x")]).is_err());
        assert!(NumberFilter::from_pairs([("deleted", "maybe")]).is_err());
    }
}
