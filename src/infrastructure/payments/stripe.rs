//! Stripe REST client.
//!
//! Checkout Sessions for one-off orders and subscriptions, subscription
//! cancellation, and `Stripe-Signature` webhook verification.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use super::{
    api_error, CheckoutSession, GatewayError, OrderCheckout, PaymentGateway, SubscriptionCheckout,
};
use crate::domain::{credential_keys, GatewayEvent, PaymentEvent, PaymentProvider, SecretProvider};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe gateway
pub struct StripeGateway {
    http: reqwest::Client,
    api_base: String,
    tolerance_secs: i64,
    secrets: Arc<dyn SecretProvider>,
}

impl StripeGateway {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        tolerance_secs: i64,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tolerance_secs,
            secrets,
        }
    }

    async fn secret(&self, key: &str) -> Result<String, GatewayError> {
        self.secrets
            .secret(key)
            .await
            .map_err(|e| GatewayError::NotConfigured(format!("{}: {}", key, e)))
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, GatewayError> {
        let secret_key = self.secret(credential_keys::STRIPE_SECRET_KEY).await?;
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(secret_key)
            .form(params)
            .send()
            .await?;

        read_json(response).await
    }

    async fn create_session(&self, params: Vec<(String, String)>) -> Result<CheckoutSession, GatewayError> {
        let session = self.post_form("/v1/checkout/sessions", &params).await?;

        let reference = str_field(&session, "id")
            .ok_or_else(|| GatewayError::Payload("checkout session without id".to_string()))?;
        let redirect_url = str_field(&session, "url")
            .ok_or_else(|| GatewayError::Payload("checkout session without url".to_string()))?;

        tracing::debug!(session_id = %reference, "Created Stripe checkout session");
        Ok(CheckoutSession {
            reference,
            redirect_url,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_order_checkout(
        &self,
        checkout: &OrderCheckout,
    ) -> Result<CheckoutSession, GatewayError> {
        self.create_session(order_session_params(checkout)).await
    }

    async fn create_subscription_checkout(
        &self,
        checkout: &SubscriptionCheckout,
    ) -> Result<CheckoutSession, GatewayError> {
        let price_id = checkout.stripe_price_id.as_deref().ok_or_else(|| {
            GatewayError::NotConfigured(format!(
                "product {} has no Stripe price id",
                checkout.product_id
            ))
        })?;

        let params = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("success_url".to_string(), checkout.success_url.clone()),
            ("cancel_url".to_string(), checkout.cancel_url.clone()),
            ("customer_email".to_string(), checkout.email.clone()),
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("metadata[user_id]".to_string(), checkout.user_id.to_string()),
            ("metadata[product_id]".to_string(), checkout.product_id.to_string()),
            (
                "subscription_data[metadata][user_id]".to_string(),
                checkout.user_id.to_string(),
            ),
            (
                "subscription_data[metadata][product_id]".to_string(),
                checkout.product_id.to_string(),
            ),
        ];

        self.create_session(params).await
    }

    async fn cancel_subscription(&self, gateway_subscription_id: &str) -> Result<(), GatewayError> {
        let secret_key = self.secret(credential_keys::STRIPE_SECRET_KEY).await?;
        let response = self
            .http
            .delete(format!(
                "{}/v1/subscriptions/{}",
                self.api_base, gateway_subscription_id
            ))
            .bearer_auth(secret_key)
            .send()
            .await?;

        read_json(response).await?;
        Ok(())
    }

    async fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), GatewayError> {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| GatewayError::InvalidSignature("missing Stripe-Signature header".to_string()))?;

        let secret = self.secret(credential_keys::STRIPE_WEBHOOK_SECRET).await?;
        verify_stripe_signature(&secret, header, body, self.tolerance_secs, Utc::now().timestamp())
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<GatewayEvent, GatewayError> {
        parse_stripe_event(body)
    }
}

/// Form parameters of a payment-mode Checkout Session.
///
/// Shipping and tax become extra line items so the session total equals the
/// order total.
fn order_session_params(checkout: &OrderCheckout) -> Vec<(String, String)> {
    let currency = checkout.currency.to_ascii_lowercase();
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), checkout.success_url.clone()),
        ("cancel_url".to_string(), checkout.cancel_url.clone()),
        ("client_reference_id".to_string(), checkout.order_id.to_string()),
        ("customer_email".to_string(), checkout.email.clone()),
        ("metadata[order_id]".to_string(), checkout.order_id.to_string()),
        ("metadata[order_number]".to_string(), checkout.order_number.clone()),
    ];

    let mut lines: Vec<(String, i64, i32)> = checkout
        .lines
        .iter()
        .map(|l| (l.name.clone(), l.unit_amount_cents, l.quantity))
        .collect();
    if checkout.shipping_cents > 0 {
        lines.push(("Shipping".to_string(), checkout.shipping_cents, 1));
    }
    if checkout.tax_cents > 0 {
        lines.push(("Tax".to_string(), checkout.tax_cents, 1));
    }

    for (i, (name, amount, quantity)) in lines.into_iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        params.push((format!("{}[price_data][currency]", prefix), currency.clone()));
        params.push((format!("{}[price_data][product_data][name]", prefix), name));
        params.push((format!("{}[price_data][unit_amount]", prefix), amount.to_string()));
        params.push((format!("{}[quantity]", prefix), quantity.to_string()));
    }

    params
}

async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status, &text));
    }
    serde_json::from_str(&text).map_err(|e| GatewayError::Payload(e.to_string()))
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`, as Stripe computes `v1`.
#[cfg(test)]
fn sign_stripe_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`).
///
/// The timestamp must be within `tolerance_secs` of `now`; any `v1` entry may
/// match. Comparison is constant-time.
pub fn verify_stripe_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    tolerance_secs: i64,
    now: i64,
) -> Result<(), GatewayError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((name, value)) = part.trim().split_once('=') else {
            continue;
        };
        match name {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| GatewayError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(GatewayError::InvalidSignature("missing v1 signature".to_string()));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(GatewayError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let matched = signatures.iter().any(|signature| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(body);
        mac.verify_slice(signature).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(GatewayError::InvalidSignature("signature mismatch".to_string()))
    }
}

/// Parse a Stripe `Event` into a provider-neutral event.
pub fn parse_stripe_event(body: &[u8]) -> Result<GatewayEvent, GatewayError> {
    let json: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::Payload(e.to_string()))?;

    let event_id = str_field(&json, "id")
        .ok_or_else(|| GatewayError::Payload("event without id".to_string()))?;
    let event_type = str_field(&json, "type")
        .ok_or_else(|| GatewayError::Payload("event without type".to_string()))?;
    let object = json
        .pointer("/data/object")
        .ok_or_else(|| GatewayError::Payload("event without data.object".to_string()))?;

    let event = match event_type.as_str() {
        "checkout.session.completed" => checkout_completed(object)?,
        "charge.refunded" => {
            let fully_refunded = object.get("refunded").and_then(Value::as_bool).unwrap_or(false);
            match str_field(object, "payment_intent") {
                Some(payment_reference) if fully_refunded => {
                    PaymentEvent::OrderRefunded { payment_reference }
                }
                _ => PaymentEvent::Ignored,
            }
        }
        "invoice.paid" => match invoice_subscription(object) {
            Some(gateway_subscription_id) => PaymentEvent::SubscriptionPaymentSucceeded {
                gateway_subscription_id,
                gateway_payment_id: str_field(object, "id")
                    .ok_or_else(|| GatewayError::Payload("invoice without id".to_string()))?,
                amount_cents: object.get("amount_paid").and_then(Value::as_i64).unwrap_or(0),
                currency: str_field(object, "currency")
                    .map(|c| c.to_ascii_uppercase())
                    .unwrap_or_default(),
                current_period_end: object
                    .pointer("/lines/data/0/period/end")
                    .and_then(Value::as_i64)
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            },
            None => PaymentEvent::Ignored,
        },
        "invoice.payment_failed" => match invoice_subscription(object) {
            Some(gateway_subscription_id) => {
                PaymentEvent::SubscriptionPaymentFailed { gateway_subscription_id }
            }
            None => PaymentEvent::Ignored,
        },
        "customer.subscription.deleted" => PaymentEvent::SubscriptionCancelled {
            gateway_subscription_id: subscription_id(object)?,
        },
        "customer.subscription.updated" => match object.get("status").and_then(Value::as_str) {
            Some("incomplete_expired") | Some("unpaid") => PaymentEvent::SubscriptionExpired {
                gateway_subscription_id: subscription_id(object)?,
            },
            Some("past_due") => PaymentEvent::SubscriptionPaymentFailed {
                gateway_subscription_id: subscription_id(object)?,
            },
            _ => PaymentEvent::Ignored,
        },
        _ => PaymentEvent::Ignored,
    };

    Ok(GatewayEvent {
        provider: PaymentProvider::Stripe,
        event_id,
        event_type,
        event,
    })
}

fn checkout_completed(session: &Value) -> Result<PaymentEvent, GatewayError> {
    match session.get("mode").and_then(Value::as_str) {
        Some("payment") => {
            if session.get("payment_status").and_then(Value::as_str) == Some("unpaid") {
                return Ok(PaymentEvent::Ignored);
            }
            let order_id = str_field(session, "client_reference_id")
                .and_then(|id| id.parse::<i64>().ok())
                .ok_or_else(|| {
                    GatewayError::Payload("session without a numeric client_reference_id".to_string())
                })?;
            let payment_reference = str_field(session, "payment_intent")
                .or_else(|| str_field(session, "id"))
                .ok_or_else(|| GatewayError::Payload("session without id".to_string()))?;

            Ok(PaymentEvent::OrderPaid {
                order_id,
                payment_reference,
                amount_cents: session.get("amount_total").and_then(Value::as_i64),
            })
        }
        Some("subscription") => {
            let gateway_subscription_id = str_field(session, "subscription")
                .ok_or_else(|| GatewayError::Payload("session without subscription".to_string()))?;
            let metadata_id = |name: &str| {
                session
                    .pointer(&format!("/metadata/{}", name))
                    .and_then(Value::as_str)
                    .and_then(|v| v.parse::<i64>().ok())
                    .ok_or_else(|| GatewayError::Payload(format!("session metadata without {}", name)))
            };

            Ok(PaymentEvent::SubscriptionActivated {
                gateway_subscription_id,
                user_id: metadata_id("user_id")?,
                product_id: metadata_id("product_id")?,
                current_period_end: None,
            })
        }
        _ => Ok(PaymentEvent::Ignored),
    }
}

/// Subscription id of an invoice; newer API versions nest it under `parent`.
fn invoice_subscription(invoice: &Value) -> Option<String> {
    str_field(invoice, "subscription").or_else(|| {
        invoice
            .pointer("/parent/subscription_details/subscription")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn subscription_id(subscription: &Value) -> Result<String, GatewayError> {
    str_field(subscription, "id")
        .ok_or_else(|| GatewayError::Payload("subscription without id".to_string()))
}

fn str_field(value: &Value, name: &str) -> Option<String> {
    value
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
