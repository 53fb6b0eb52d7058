//! Payment webhook endpoint tests

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::json;

use crate::common::TestApp;

async fn server() -> TestServer {
    TestServer::new(TestApp::new().await.router).unwrap()
}

#[tokio::test]
async fn test_stripe_webhook_without_signature_is_rejected() {
    let server = server().await;

    let response = server
        .post("/api/StoreStripeWebhook")
        .json(&json!({ "id": "evt_1", "type": "checkout.session.completed" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<serde_json::Value>();
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid webhook signature"));
}

#[tokio::test]
async fn test_paypal_webhook_without_transmission_headers_is_rejected() {
    let server = server().await;

    let response = server
        .post("/api/store/paypal-webhook")
        .add_header(
            HeaderName::from_static("paypal-transmission-id"),
            HeaderValue::from_static("tx-1"),
        )
        .json(&json!({ "id": "WH-1", "event_type": "PAYMENT.CAPTURE.COMPLETED" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhooks_only_accept_post() {
    let server = server().await;

    let response = server.get("/api/StoreStripeWebhook").await;

    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
}
