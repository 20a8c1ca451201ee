//! Telnyx HTTP client.

use crate::error::TelnyxError;
use crate::types::*;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.telnyx.com/v2";

/// Telnyx v2 REST client.
///
/// The API key is stored using `SecretString` so it never shows up in
/// logs or debug output.
#[derive(Clone)]
pub struct TelnyxClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    connection_id: Option<String>,
    messaging_profile_id: Option<String>,
}

impl TelnyxClient {
    /// Create a new Telnyx client.
    ///
    /// `connection_id` and `messaging_profile_id` are attached to number
    /// orders when set, so purchased numbers are routed immediately.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        connection_id: Option<String>,
        messaging_profile_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TelnyxError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: SecretString::new(api_key.into()),
            connection_id: connection_id.filter(|s| !s.is_empty()),
            messaging_profile_id: messaging_profile_id.filter(|s| !s.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(
            "Authorization",
            format!("Bearer {}", self.api_key.expose_secret()),
        )
    }

    /// Search numbers available for purchase in a country.
    #[instrument(skip(self))]
    pub async fn available_phone_numbers(
        &self,
        country_code: &str,
        limit: u32,
    ) -> Result<Vec<AvailablePhoneNumber>, TelnyxError> {
        let limit = limit.to_string();
        let response = self
            .authorized(self.client.get(format!("{}/available_phone_numbers", self.base_url)))
            .query(&[
                ("filter[country_code]", country_code),
                ("filter[limit]", limit.as_str()),
            ])
            .send()
            .await?;

        let list: ListResponse<AvailablePhoneNumber> = self.handle_response(response).await?;
        debug!("Found {} available numbers in {}", list.data.len(), country_code);
        Ok(list.data)
    }

    /// Order a single number.
    #[instrument(skip(self))]
    pub async fn create_number_order(&self, phone_number: &str) -> Result<NumberOrder, TelnyxError> {
        let request = NumberOrderRequest {
            phone_numbers: vec![OrderPhoneNumber {
                phone_number: phone_number.to_string(),
            }],
            connection_id: self.connection_id.clone(),
            messaging_profile_id: self.messaging_profile_id.clone(),
        };

        let response = self
            .authorized(self.client.post(format!("{}/number_orders", self.base_url)))
            .json(&request)
            .send()
            .await?;

        let order: DataResponse<NumberOrder> = self.handle_response(response).await?;
        info!("Created number order {} ({})", order.data.id, order.data.status);
        Ok(order.data)
    }

    /// Owned numbers matching `phone_number` exactly.
    #[instrument(skip(self))]
    pub async fn find_phone_numbers(&self, phone_number: &str) -> Result<Vec<PhoneNumber>, TelnyxError> {
        let response = self
            .authorized(self.client.get(format!("{}/phone_numbers", self.base_url)))
            .query(&[("filter[phone_number]", phone_number)])
            .send()
            .await?;

        let list: ListResponse<PhoneNumber> = self.handle_response(response).await?;
        Ok(list.data)
    }

    /// The owned number record for `phone_number`.
    pub async fn get_phone_number_by_number(&self, phone_number: &str) -> Result<PhoneNumber, TelnyxError> {
        self.find_phone_numbers(phone_number)
            .await?
            .into_iter()
            .find(|n| n.phone_number == phone_number)
            .ok_or(TelnyxError::EmptyResponse)
    }

    #[instrument(skip(self))]
    pub async fn get_phone_number(&self, id: &str) -> Result<PhoneNumber, TelnyxError> {
        let response = self
            .authorized(self.client.get(format!("{}/phone_numbers/{}", self.base_url, id)))
            .send()
            .await?;

        let number: DataResponse<PhoneNumber> = self.handle_response(response).await?;
        Ok(number.data)
    }

    /// Replace the tags on an owned number.
    #[instrument(skip(self, tags))]
    pub async fn update_phone_number_tags(
        &self,
        id: &str,
        tags: &[String],
    ) -> Result<PhoneNumber, TelnyxError> {
        let request = UpdatePhoneNumberRequest {
            tags: Some(tags.to_vec()),
            ..Default::default()
        };

        let response = self
            .authorized(self.client.patch(format!("{}/phone_numbers/{}", self.base_url, id)))
            .json(&request)
            .send()
            .await?;

        let number: DataResponse<PhoneNumber> = self.handle_response(response).await?;
        debug!("Updated tags on {} ({} tags)", id, number.data.tags.len());
        Ok(number.data)
    }

    /// Release an owned number back to the carrier.
    #[instrument(skip(self))]
    pub async fn delete_phone_number(&self, id: &str) -> Result<PhoneNumber, TelnyxError> {
        let response = self
            .authorized(self.client.delete(format!("{}/phone_numbers/{}", self.base_url, id)))
            .send()
            .await?;

        let number: DataResponse<PhoneNumber> = self.handle_response(response).await?;
        info!("Released phone number {} ({})", number.data.phone_number, id);
        Ok(number.data)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, TelnyxError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            if body.trim().is_empty() {
                return Err(TelnyxError::EmptyResponse);
            }
            debug!("Response body: {}", body.chars().take(200).collect::<String>());
            serde_json::from_str(&body).map_err(TelnyxError::from)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    async fn extract_error(&self, response: reqwest::Response) -> TelnyxError {
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Telnyx authentication failed");
                TelnyxError::Unauthorized
            }
            StatusCode::NOT_FOUND => TelnyxError::NotFound,
            _ => {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".into());
                let message = serde_json::from_str::<ErrorResponse>(&body)
                    .ok()
                    .map(|e| e.summary())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(body);
                TelnyxError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}
