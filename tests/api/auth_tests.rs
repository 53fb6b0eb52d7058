//! Authentication and access control API tests

use axum::http::StatusCode;
use fake::{faker::internet::en::SafeEmail, Fake};
use pretty_assertions::assert_eq;
use serde_json::json;
use storefront::domain::UserRole;
use test_case::test_case;

use crate::common::{access_token, body_json, TestApp};

#[test_case("/api/account/me" ; "profile")]
#[test_case("/api/orders" ; "order history")]
#[test_case("/api/subscriptions" ; "subscriptions")]
#[test_case("/api/admin/orders" ; "admin orders")]
#[tokio::test]
async fn test_protected_routes_require_token(uri: &str) {
    let app = TestApp::new().await;

    let response = app.get(uri).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Missing authorization header");
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::new().await;

    let response = app.get_auth("/api/account/me", "not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["message"], "Invalid token");
}

#[tokio::test]
async fn test_customers_cannot_reach_admin_routes() {
    let app = TestApp::new().await;
    let token = access_token(7, UserRole::Customer);

    let response = app.get_auth("/api/admin/orders", &token).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_order_id_is_bad_request() {
    let app = TestApp::new().await;
    let token = access_token(7, UserRole::Customer);

    let response = app.get_auth("/api/orders/not-a-number", &token).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Invalid order ID");
}

#[tokio::test]
async fn test_register_with_invalid_email_fails() {
    let app = TestApp::new().await;
    let body = json!({
        "email": "not-an-email",
        "password": "ValidPassword123!"
    });

    let response = app.post_json("/api/account/register", &body.to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 10007);
}

#[tokio::test]
async fn test_register_with_short_password_fails() {
    let app = TestApp::new().await;
    let email: String = SafeEmail().fake();
    let body = json!({
        "email": email,
        "password": "short"
    });

    let response = app.post_json("/api/account/register", &body.to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_cart_token_is_rejected() {
    let app = TestApp::new().await;
    let body = json!({ "product_id": "1", "quantity": 1 });

    let response = app
        .post_json_with_cart("/api/cart/items", &body.to_string(), "not a token!")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
