//! Twilio carrier adapter. Registered so Twilio-backed records resolve to
//! an adapter, but no operation is wired to the Twilio API yet.

use super::{AvailableNumber, ProviderAdapter, ProviderNumber};
use crate::error::ProviderError;
use async_trait::async_trait;
use number_store::{Number, ProviderName};

#[derive(Debug, Default)]
pub struct TwilioProvider;

impl TwilioProvider {
    pub fn new() -> Self {
        Self
    }

    fn unimplemented(operation: &'static str) -> ProviderError {
        ProviderError::Unimplemented {
            provider: ProviderName::Twilio,
            operation,
        }
    }
}

#[async_trait]
impl ProviderAdapter for TwilioProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Twilio
    }

    async fn purchase(&self, _number: &str) -> Result<ProviderNumber, ProviderError> {
        Err(Self::unimplemented("purchase"))
    }

    async fn release(&self, _number: &Number) -> Result<(), ProviderError> {
        Err(Self::unimplemented("release"))
    }

    async fn update_tags(&self, _number: &Number, _tags: &[String]) -> Result<(), ProviderError> {
        Err(Self::unimplemented("update_tags"))
    }

    async fn get_available_numbers(
        &self,
        _country_code: &str,
        _limit: u32,
    ) -> Result<Vec<AvailableNumber>, ProviderError> {
        Err(Self::unimplemented("get_available_numbers"))
    }
}
