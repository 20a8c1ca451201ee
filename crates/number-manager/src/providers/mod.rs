//! Carrier adapters.
//!
//! Every carrier is reached through [`ProviderAdapter`]. Adapters are
//! registered once at startup in a [`ProviderRegistry`] keyed by
//! [`ProviderName`]; the engine never switches on the carrier itself.

mod telnyx;
mod twilio;

pub use telnyx::TelnyxProvider;
pub use twilio::TwilioProvider;

use crate::error::{NumberError, ProviderError};
use async_trait::async_trait;
use number_store::{Number, NumberStatus, ProviderName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Capability advertised for an available number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberFeature {
    Voice,
    Sms,
    Mms,
    Fax,
    Emergency,
}

impl NumberFeature {
    /// Parse a carrier feature name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "voice" => Some(NumberFeature::Voice),
            "sms" => Some(NumberFeature::Sms),
            "mms" => Some(NumberFeature::Mms),
            "fax" => Some(NumberFeature::Fax),
            "emergency" => Some(NumberFeature::Emergency),
            _ => None,
        }
    }
}

/// A number that can be claimed, independent of the carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableNumber {
    pub number: String,
    pub provider_name: ProviderName,
    pub country: String,
    pub region: String,
    pub postal_code: String,
    pub features: Vec<NumberFeature>,
}

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderNumber {
    /// Carrier side identifier, stored as the provider reference id.
    pub id: String,
    pub status: NumberStatus,
    pub t38_enabled: bool,
    pub emergency_enabled: bool,
}

/// Carrier operations the engine relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Registry key of this adapter.
    fn name(&self) -> ProviderName;

    async fn purchase(&self, number: &str) -> Result<ProviderNumber, ProviderError>;

    /// Release a number. A number the carrier no longer knows is
    /// treated as released.
    async fn release(&self, number: &Number) -> Result<(), ProviderError>;

    async fn update_tags(&self, number: &Number, tags: &[String]) -> Result<(), ProviderError>;

    async fn get_available_numbers(
        &self,
        country_code: &str,
        limit: u32,
    ) -> Result<Vec<AvailableNumber>, ProviderError>;
}

/// Adapters keyed by provider name, plus the provider used for purchases.
pub struct ProviderRegistry {
    providers: HashMap<ProviderName, Arc<dyn ProviderAdapter>>,
    default: ProviderName,
}

impl ProviderRegistry {
    pub fn new(default: ProviderName) -> Self {
        Self {
            providers: HashMap::new(),
            default,
        }
    }

    /// Register an adapter under its own name, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let name = adapter.name();
        info!("Registered provider adapter: {}", name);
        self.providers.insert(name, adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, name: ProviderName) -> Result<Arc<dyn ProviderAdapter>, NumberError> {
        self.providers
            .get(&name)
            .cloned()
            .ok_or(NumberError::UnsupportedProvider(name))
    }

    pub fn default_name(&self) -> ProviderName {
        self.default
    }

    /// Adapter used for purchases and browsing.
    pub fn default_provider(&self) -> Result<Arc<dyn ProviderAdapter>, NumberError> {
        self.get(self.default)
    }

    pub fn contains(&self, name: ProviderName) -> bool {
        self.providers.contains_key(&name)
    }

    pub fn list_providers(&self) -> Vec<ProviderName> {
        self.providers.keys().copied().collect()
    }
}
