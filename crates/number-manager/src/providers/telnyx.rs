//! Telnyx carrier adapter.

use super::{AvailableNumber, NumberFeature, ProviderAdapter, ProviderNumber};
use crate::error::ProviderError;
use async_trait::async_trait;
use number_store::{Number, NumberStatus, ProviderName};
use std::sync::Arc;
use telnyx_client::{AvailablePhoneNumber, TelnyxClient, TelnyxError};
use tracing::{debug, info, instrument, warn};

const DEFAULT_SEARCH_LIMIT: u32 = 10;
const MAX_SEARCH_LIMIT: u32 = 100;

pub struct TelnyxProvider {
    client: Arc<TelnyxClient>,
}

impl TelnyxProvider {
    pub fn new(client: Arc<TelnyxClient>) -> Self {
        Self { client }
    }
}

fn clamp_limit(limit: u32) -> u32 {
    match limit {
        0 => DEFAULT_SEARCH_LIMIT,
        n => n.min(MAX_SEARCH_LIMIT),
    }
}

fn status_from_telnyx(status: &str) -> NumberStatus {
    match status {
        "deleted" => NumberStatus::Deleted,
        _ => NumberStatus::Active,
    }
}

fn to_available(number: AvailablePhoneNumber, country_code: &str) -> AvailableNumber {
    let country = number
        .region("country_code")
        .unwrap_or(country_code)
        .to_string();
    let region = number
        .region("state")
        .or_else(|| number.region("rate_center"))
        .unwrap_or_default()
        .to_string();
    let postal_code = number.region("location").unwrap_or_default().to_string();
    let features = number
        .features
        .iter()
        .filter_map(|f| NumberFeature::from_name(&f.name))
        .collect();

    AvailableNumber {
        number: number.phone_number,
        provider_name: ProviderName::Telnyx,
        country,
        region,
        postal_code,
        features,
    }
}

#[async_trait]
impl ProviderAdapter for TelnyxProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Telnyx
    }

    #[instrument(skip(self))]
    async fn purchase(&self, number: &str) -> Result<ProviderNumber, ProviderError> {
        let order = self.client.create_number_order(number).await?;
        if order.status == "failure" || order.status == "failed" {
            return Err(ProviderError::Rejected(format!(
                "number order {} for {} failed",
                order.id, number
            )));
        }

        let purchased = self.client.get_phone_number_by_number(number).await?;
        info!("Purchased {} from telnyx ({})", number, purchased.id);

        Ok(ProviderNumber {
            id: purchased.id,
            status: status_from_telnyx(&purchased.status),
            t38_enabled: purchased.t38_fax_gateway_enabled,
            emergency_enabled: purchased.emergency_enabled,
        })
    }

    #[instrument(skip(self, number), fields(id = %number.id, number = %number.number))]
    async fn release(&self, number: &Number) -> Result<(), ProviderError> {
        if number.provider_reference_id.is_empty() {
            warn!("No telnyx reference for {}, nothing to release", number.number);
            return Ok(());
        }

        match self
            .client
            .delete_phone_number(&number.provider_reference_id)
            .await
        {
            Ok(_) => Ok(()),
            Err(TelnyxError::NotFound) => {
                info!(
                    "Telnyx number {} already released",
                    number.provider_reference_id
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, number, tags), fields(id = %number.id))]
    async fn update_tags(&self, number: &Number, tags: &[String]) -> Result<(), ProviderError> {
        if number.provider_reference_id.is_empty() {
            return Err(ProviderError::Rejected(format!(
                "number {} has no provider reference",
                number.id
            )));
        }

        self.client
            .update_phone_number_tags(&number.provider_reference_id, tags)
            .await?;
        debug!("Tagged telnyx number {}", number.provider_reference_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_available_numbers(
        &self,
        country_code: &str,
        limit: u32,
    ) -> Result<Vec<AvailableNumber>, ProviderError> {
        let numbers = self
            .client
            .available_phone_numbers(country_code, clamp_limit(limit))
            .await?;

        Ok(numbers
            .into_iter()
            .map(|n| to_available(n, country_code))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use telnyx_client::{Feature, RegionInformation};
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(mock_server: &MockServer) -> TelnyxProvider {
        let client = TelnyxClient::new("test-key", mock_server.uri(), None, None, Duration::from_secs(5)).unwrap();
        TelnyxProvider::new(Arc::new(client))
    }

    fn stored(reference_id: &str) -> Number {
        let mut number = Number::new(Uuid::new_v4(), Uuid::new_v4(), "+14703298699");
        number.provider_name = ProviderName::Telnyx;
        number.provider_reference_id = reference_id.to_string();
        number
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(0), 10);
        assert_eq!(clamp_limit(5), 5);
        assert_eq!(clamp_limit(500), 100);
    }

    #[test]
    fn test_to_available() {
        let number = AvailablePhoneNumber {
            phone_number: "+16188850188".into(),
            region_information: vec![
                RegionInformation {
                    region_type: "rate_center".into(),
                    region_name: "ALTON".into(),
                },
                RegionInformation {
                    region_type: "state".into(),
                    region_name: "IL".into(),
                },
            ],
            features: vec![
                Feature { name: "sms".into() },
                Feature { name: "voice".into() },
                Feature { name: "hd_voice".into() },
            ],
            ..Default::default()
        };

        let available = to_available(number, "US");
        assert_eq!(available.country, "US");
        assert_eq!(available.region, "IL");
        assert_eq!(available.provider_name, ProviderName::Telnyx);
        assert_eq!(available.features, vec![NumberFeature::Sms, NumberFeature::Voice]);
    }

    #[tokio::test]
    async fn test_purchase() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/number_orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "order-1", "status": "pending", "phone_numbers": []}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/phone_numbers"))
            .and(query_param("filter[phone_number]", "+14703298699"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": "1580568175064384684",
                    "phone_number": "+14703298699",
                    "status": "active",
                    "t38_fax_gateway_enabled": true,
                    "emergency_enabled": false
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let purchased = provider(&mock_server).purchase("+14703298699").await.unwrap();

        assert_eq!(purchased.id, "1580568175064384684");
        assert_eq!(purchased.status, NumberStatus::Active);
        assert!(purchased.t38_enabled);
    }

    #[tokio::test]
    async fn test_purchase_order_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/number_orders"))
            .respond_with(ResponseTemplate::new(422).set_body_string("number unavailable"))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server).purchase("+14703298699").await;
        assert!(matches!(
            result,
            Err(ProviderError::Telnyx(TelnyxError::Api { status: 422, .. }))
        ));
    }

    #[tokio::test]
    async fn test_release_treats_not_found_as_released() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/phone_numbers/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        provider(&mock_server).release(&stored("gone")).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_without_reference_skips_carrier() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        provider(&mock_server).release(&stored("")).await.unwrap();
    }

    #[tokio::test]
    async fn test_release_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/phone_numbers/1580568175064384684"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server).release(&stored("1580568175064384684")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_available_numbers_clamps_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/available_phone_numbers"))
            .and(query_param("filter[country_code]", "US"))
            .and(query_param("filter[limit]", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"phone_number": "+16188850188", "features": [{"name": "voice"}]}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let numbers = provider(&mock_server).get_available_numbers("US", 0).await.unwrap();

        assert_eq!(numbers.len(), 1);
        assert_eq!(numbers[0].country, "US");
        assert_eq!(numbers[0].features, vec![NumberFeature::Voice]);
    }
}
