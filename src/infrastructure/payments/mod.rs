//! Payment gateway clients.
//!
//! Stripe and PayPal sit behind the `PaymentGateway` trait. Each client
//! creates hosted checkouts, cancels subscriptions, verifies webhook
//! deliveries and parses them into provider-neutral `GatewayEvent`s.

mod paypal;
mod stripe;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Serialize;

use crate::domain::{GatewayEvent, PaymentProvider};
use crate::shared::error::AppError;

pub use paypal::{parse_paypal_event, PayPalGateway};
pub use stripe::{parse_stripe_event, verify_stripe_signature, StripeGateway};

/// Gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway is not configured: {0}")]
    NotConfigured(String),

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("malformed gateway payload: {0}")]
    Payload(String),

    #[error("operation not supported by {0}")]
    Unsupported(&'static str),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSignature(msg) => {
                AppError::BadRequest(format!("Invalid webhook signature: {}", msg))
            }
            GatewayError::Payload(msg) => AppError::BadRequest(format!("Malformed payload: {}", msg)),
            GatewayError::NotConfigured(msg) => AppError::Internal(msg),
            other => AppError::PaymentGateway(other.to_string()),
        }
    }
}

/// One line of a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLine {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: i32,
}

/// A one-off order to be paid on the gateway's hosted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCheckout {
    pub order_id: i64,
    pub order_number: String,
    pub email: String,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub subtotal_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub success_url: String,
    pub cancel_url: String,
}

/// A recurring subscription to be started on the gateway's hosted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCheckout {
    pub user_id: i64,
    pub product_id: i64,
    pub email: String,
    pub stripe_price_id: Option<String>,
    pub paypal_plan_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted checkout created at the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSession {
    /// Gateway object id (Stripe Checkout Session, PayPal order or subscription)
    pub reference: String,
    /// Page the customer is sent to
    pub redirect_url: String,
}

/// Result of capturing an approved PayPal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPayment {
    pub capture_id: String,
    pub order_id: Option<i64>,
    pub amount_cents: Option<i64>,
    pub completed: bool,
}

/// A payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Create a hosted checkout for an order.
    async fn create_order_checkout(
        &self,
        checkout: &OrderCheckout,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Create a hosted checkout for a recurring subscription.
    async fn create_subscription_checkout(
        &self,
        checkout: &SubscriptionCheckout,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Cancel a subscription at the gateway.
    async fn cancel_subscription(&self, gateway_subscription_id: &str) -> Result<(), GatewayError>;

    /// Capture an approved order after the customer returns.
    async fn capture_order(&self, _reference: &str) -> Result<CapturedPayment, GatewayError> {
        Err(GatewayError::Unsupported(self.provider().as_str()))
    }

    /// Reject deliveries that did not come from the gateway.
    async fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), GatewayError>;

    /// Parse a verified delivery.
    fn parse_webhook(&self, body: &[u8]) -> Result<GatewayEvent, GatewayError>;
}

/// Both configured gateways.
#[derive(Clone)]
pub struct PaymentGateways {
    pub stripe: Arc<dyn PaymentGateway>,
    pub paypal: Arc<dyn PaymentGateway>,
}

impl PaymentGateways {
    pub fn get(&self, provider: PaymentProvider) -> Arc<dyn PaymentGateway> {
        match provider {
            PaymentProvider::Stripe => self.stripe.clone(),
            PaymentProvider::PayPal => self.paypal.clone(),
        }
    }
}

/// Pull a message out of a gateway error body, falling back to the raw text.
pub(crate) fn api_error(status: reqwest::StatusCode, body: &str) -> GatewayError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .or_else(|| json.get("message"))
                .or_else(|| json.get("error_description"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    GatewayError::Api {
        status: status.as_u16(),
        message,
    }
}
