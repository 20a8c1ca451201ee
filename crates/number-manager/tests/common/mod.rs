//! Common test utilities for integration tests.

#![allow(dead_code)]

use billing_client::BillingClient;
use number_manager::{
    HandlerSettings, NumberHandler, ProviderRegistry, TelnyxProvider, TwilioProvider,
    WebhookNotifier,
};
use number_store::{connect, MemoryCache, NumberDb, ProviderName};
use std::sync::Arc;
use std::time::Duration;
use telnyx_client::TelnyxClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TELNYX_ID: &str = "1580568175064384684";

/// A handler wired to mock carrier, billing and webhook servers.
pub struct TestService {
    pub telnyx: MockServer,
    pub billing: MockServer,
    pub webhook: MockServer,
    pub db: NumberDb,
    pub handler: NumberHandler,
}

pub async fn test_service() -> TestService {
    let telnyx = MockServer::start().await;
    let billing = MockServer::start().await;
    let webhook = MockServer::start().await;

    let pool = connect("sqlite::memory:", 1).await.unwrap();
    let db = NumberDb::new(pool, Arc::new(MemoryCache::new(Duration::from_secs(60))));
    db.migrate().await.unwrap();

    let telnyx_client = TelnyxClient::new(
        "test-api-key",
        telnyx.uri(),
        Some("2054833017033065613".into()),
        None,
        Duration::from_secs(5),
    )
    .unwrap();
    let registry = ProviderRegistry::new(ProviderName::Telnyx)
        .with(Arc::new(TelnyxProvider::new(Arc::new(telnyx_client))))
        .with(Arc::new(TwilioProvider::new()));

    let billing_client = BillingClient::new(billing.uri(), Duration::from_secs(5)).unwrap();
    let notifier =
        WebhookNotifier::new(format!("{}/events", webhook.uri()), Duration::from_secs(5)).unwrap();

    let handler = NumberHandler::new(
        db.clone(),
        registry,
        Arc::new(billing_client),
        Arc::new(notifier),
        HandlerSettings::default(),
    );

    TestService {
        telnyx,
        billing,
        webhook,
        db,
        handler,
    }
}

pub fn telnyx_phone_number(number: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": TELNYX_ID,
        "record_type": "phone_number",
        "phone_number": number,
        "status": status,
        "tags": [],
        "t38_fax_gateway_enabled": true,
        "emergency_enabled": false
    })
}

pub async fn mount_balance(service: &TestService, valid: bool) {
    Mock::given(method("POST"))
        .and(path("/v1/accounts/is_valid_balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"valid": valid})))
        .mount(&service.billing)
        .await;
}

pub async fn mount_webhook(service: &TestService, status: u16) {
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&service.webhook)
        .await;
}

/// Mount a successful number order and the follow-up lookup.
pub async fn mount_purchase(service: &TestService, number: &str) {
    Mock::given(method("POST"))
        .and(path("/number_orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "id": "12ade33a-21c0-473b-b055-b3c836e1c292",
                "record_type": "number_order",
                "status": "success",
                "phone_numbers_count": 1,
                "phone_numbers": [{"phone_number": number, "status": "success"}]
            }
        })))
        .expect(1)
        .mount(&service.telnyx)
        .await;

    Mock::given(method("GET"))
        .and(path("/phone_numbers"))
        .and(query_param("filter[phone_number]", number))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [telnyx_phone_number(number, "active")]
        })))
        .mount(&service.telnyx)
        .await;

    Mock::given(method("PATCH"))
        .and(path(format!("/phone_numbers/{}", TELNYX_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": telnyx_phone_number(number, "active")
        })))
        .mount(&service.telnyx)
        .await;
}

/// Event types posted to the webhook so far, in order.
pub async fn published_events(service: &TestService) -> Vec<serde_json::Value> {
    service
        .webhook
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}
