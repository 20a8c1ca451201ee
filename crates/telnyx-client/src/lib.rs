//! Telnyx v2 REST API client.
//!
//! Covers the subset of the API used to provision numbers: searching
//! available numbers, placing number orders, and reading, tagging and
//! releasing owned numbers.

mod client;
mod error;
mod types;

pub use client::{TelnyxClient, DEFAULT_BASE_URL};
pub use error::TelnyxError;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client(mock_server: &MockServer) -> TelnyxClient {
        TelnyxClient::new(
            "test-key",
            mock_server.uri(),
            Some("2054833017033065613".into()),
            None,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn phone_number_json() -> serde_json::Value {
        serde_json::json!({
            "id": "1580568175064384684",
            "record_type": "phone_number",
            "phone_number": "+14703298699",
            "status": "active",
            "tags": [],
            "connection_id": "2054833017033065613",
            "t38_fax_gateway_enabled": true,
            "emergency_enabled": false,
            "purchased_at": "2021-02-26T18:26:49Z"
        })
    }

    #[tokio::test]
    async fn test_available_phone_numbers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/available_phone_numbers"))
            .and(query_param("filter[country_code]", "US"))
            .and(query_param("filter[limit]", "2"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {
                        "phone_number": "+16188850188",
                        "record_type": "available_phone_number",
                        "region_information": [
                            {"region_type": "rate_center", "region_name": "ALTON"},
                            {"region_type": "state", "region_name": "IL"},
                            {"region_type": "country_code", "region_name": "US"}
                        ],
                        "features": [{"name": "sms"}, {"name": "voice"}],
                        "cost_information": {"upfront_cost": "1.00", "monthly_cost": "1.00", "currency": "USD"}
                    },
                    {
                        "phone_number": "+16188850189",
                        "features": [{"name": "voice"}]
                    }
                ],
                "metadata": {"total_results": 2}
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let numbers = client.available_phone_numbers("US", 2).await.unwrap();

        assert_eq!(numbers.len(), 2);
        assert_eq!(numbers[0].phone_number, "+16188850188");
        assert_eq!(numbers[0].region("state"), Some("IL"));
        assert_eq!(numbers[0].features.len(), 2);
        assert!(numbers[1].region_information.is_empty());
    }

    #[tokio::test]
    async fn test_create_number_order() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/number_orders"))
            .and(body_json(serde_json::json!({
                "phone_numbers": [{"phone_number": "+14703298699"}],
                "connection_id": "2054833017033065613"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "id": "12ade33a-21c0-473b-b055-b3c836e1c292",
                    "record_type": "number_order",
                    "status": "pending",
                    "phone_numbers_count": 1,
                    "phone_numbers": [
                        {"id": "dc8e4d67-33a0-4cbb-af74-7b58f05bd494", "phone_number": "+14703298699", "status": "pending"}
                    ]
                }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let order = client.create_number_order("+14703298699").await.unwrap();

        assert_eq!(order.status, "pending");
        assert_eq!(order.phone_numbers[0].phone_number, "+14703298699");
    }

    #[tokio::test]
    async fn test_get_phone_number_by_number() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/phone_numbers"))
            .and(query_param("filter[phone_number]", "+14703298699"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [phone_number_json()]
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let number = client.get_phone_number_by_number("+14703298699").await.unwrap();

        assert_eq!(number.id, "1580568175064384684");
        assert!(number.t38_fax_gateway_enabled);
    }

    #[tokio::test]
    async fn test_get_phone_number_by_number_missing() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/phone_numbers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.get_phone_number_by_number("+14703298699").await;

        assert!(matches!(result, Err(TelnyxError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_update_phone_number_tags() {
        let mock_server = MockServer::start().await;

        let mut updated = phone_number_json();
        updated["tags"] = serde_json::json!(["CustomerID_1", "NumberID_2"]);

        Mock::given(method("PATCH"))
            .and(path("/phone_numbers/1580568175064384684"))
            .and(body_json(serde_json::json!({"tags": ["CustomerID_1", "NumberID_2"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": updated})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let tags = vec!["CustomerID_1".to_string(), "NumberID_2".to_string()];
        let number = client
            .update_phone_number_tags("1580568175064384684", &tags)
            .await
            .unwrap();

        assert_eq!(number.tags, tags);
    }

    #[tokio::test]
    async fn test_delete_phone_number() {
        let mock_server = MockServer::start().await;

        let mut deleted = phone_number_json();
        deleted["status"] = serde_json::json!("deleted");

        Mock::given(method("DELETE"))
            .and(path("/phone_numbers/1580568175064384684"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": deleted})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let number = client.delete_phone_number("1580568175064384684").await.unwrap();

        assert_eq!(number.status, "deleted");
    }

    #[tokio::test]
    async fn test_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/phone_numbers/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.delete_phone_number("missing").await;

        assert!(matches!(result, Err(TelnyxError::NotFound)));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/phone_numbers/1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.get_phone_number("1").await;

        assert!(matches!(result, Err(TelnyxError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_api_error_summary() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/number_orders"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "errors": [{"code": "10015", "title": "Invalid phone number", "detail": "not available"}]
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let result = client.create_number_order("+10000000000").await;

        match result {
            Err(TelnyxError::Api { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "10015 Invalid phone number: not available");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = TelnyxClient::new(
            "key",
            "https://api.telnyx.com/v2/",
            None,
            Some(String::new()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }
}
