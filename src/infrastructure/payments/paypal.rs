//! PayPal REST client.
//!
//! Orders v2 (create, capture), Billing subscriptions, and webhook
//! verification through the notifications API. The OAuth2 token is cached
//! until shortly before it expires.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{
    api_error, CapturedPayment, CheckoutSession, GatewayError, OrderCheckout, PaymentGateway,
    SubscriptionCheckout,
};
use crate::domain::money::{format_amount, parse_amount};
use crate::domain::{credential_keys, GatewayEvent, PaymentEvent, PaymentProvider, SecretProvider};

/// Refresh the token this long before PayPal says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const TRANSMISSION_HEADERS: [&str; 5] = [
    "paypal-auth-algo",
    "paypal-cert-url",
    "paypal-transmission-id",
    "paypal-transmission-sig",
    "paypal-transmission-time",
];

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// PayPal gateway
pub struct PayPalGateway {
    http: reqwest::Client,
    api_base: String,
    secrets: Arc<dyn SecretProvider>,
    token: Mutex<Option<AccessToken>>,
}

impl PayPalGateway {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secrets,
            token: Mutex::new(None),
        }
    }

    async fn secret(&self, key: &str) -> Result<String, GatewayError> {
        self.secrets
            .secret(key)
            .await
            .map_err(|e| GatewayError::NotConfigured(format!("{}: {}", key, e)))
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|token| token.expires_at > Instant::now())
            .map(|token| token.value.clone());
        if let Some(value) = cached {
            return Ok(value);
        }

        let client_id = self.secret(credential_keys::PAYPAL_CLIENT_ID).await?;
        let client_secret = self.secret(credential_keys::PAYPAL_CLIENT_SECRET).await?;

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let body = read_json(response).await?;

        let value = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Payload("token response without access_token".to_string()))?
            .to_string();
        let lifetime = Duration::from_secs(body.get("expires_in").and_then(Value::as_u64).unwrap_or(0));

        *self.token.lock() = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        tracing::debug!("Refreshed PayPal access token");

        Ok(value)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        read_json(response).await
    }
}

#[async_trait]
impl PaymentGateway for PayPalGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::PayPal
    }

    async fn create_order_checkout(
        &self,
        checkout: &OrderCheckout,
    ) -> Result<CheckoutSession, GatewayError> {
        let created = self
            .post_json("/v2/checkout/orders", &order_request(checkout))
            .await?;
        session_from(&created, &["payer-action", "approve"])
    }

    async fn create_subscription_checkout(
        &self,
        checkout: &SubscriptionCheckout,
    ) -> Result<CheckoutSession, GatewayError> {
        let plan_id = checkout.paypal_plan_id.as_deref().ok_or_else(|| {
            GatewayError::NotConfigured(format!(
                "product {} has no PayPal plan id",
                checkout.product_id
            ))
        })?;

        let body = json!({
            "plan_id": plan_id,
            "custom_id": format!("{}:{}", checkout.user_id, checkout.product_id),
            "subscriber": { "email_address": checkout.email },
            "application_context": {
                "user_action": "SUBSCRIBE_NOW",
                "shipping_preference": "NO_SHIPPING",
                "return_url": checkout.success_url,
                "cancel_url": checkout.cancel_url,
            }
        });

        let created = self.post_json("/v1/billing/subscriptions", &body).await?;
        session_from(&created, &["approve"])
    }

    async fn cancel_subscription(&self, gateway_subscription_id: &str) -> Result<(), GatewayError> {
        self.post_json(
            &format!("/v1/billing/subscriptions/{}/cancel", gateway_subscription_id),
            &json!({ "reason": "Cancelled by customer" }),
        )
        .await?;
        Ok(())
    }

    async fn capture_order(&self, reference: &str) -> Result<CapturedPayment, GatewayError> {
        let captured = self
            .post_json(&format!("/v2/checkout/orders/{}/capture", reference), &json!({}))
            .await?;
        parse_capture_response(&captured)
    }

    async fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), GatewayError> {
        let mut transmission = Vec::with_capacity(TRANSMISSION_HEADERS.len());
        for name in TRANSMISSION_HEADERS {
            let value = headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| GatewayError::InvalidSignature(format!("missing {} header", name)))?;
            transmission.push(value.to_string());
        }

        let webhook_event: Value =
            serde_json::from_slice(body).map_err(|e| GatewayError::Payload(e.to_string()))?;
        let webhook_id = self.secret(credential_keys::PAYPAL_WEBHOOK_ID).await?;

        let request = json!({
            "auth_algo": transmission[0],
            "cert_url": transmission[1],
            "transmission_id": transmission[2],
            "transmission_sig": transmission[3],
            "transmission_time": transmission[4],
            "webhook_id": webhook_id,
            "webhook_event": webhook_event,
        });

        let verdict = self
            .post_json("/v1/notifications/verify-webhook-signature", &request)
            .await?;
        match verdict.get("verification_status").and_then(Value::as_str) {
            Some("SUCCESS") => Ok(()),
            other => Err(GatewayError::InvalidSignature(format!(
                "verification status {}",
                other.unwrap_or("missing")
            ))),
        }
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<GatewayEvent, GatewayError> {
        parse_paypal_event(body)
    }
}

fn order_request(checkout: &OrderCheckout) -> Value {
    let money = |cents: i64| json!({ "currency_code": checkout.currency, "value": format_amount(cents) });

    let items: Vec<Value> = checkout
        .lines
        .iter()
        .map(|line| {
            json!({
                "name": line.name,
                "quantity": line.quantity.to_string(),
                "unit_amount": money(line.unit_amount_cents),
            })
        })
        .collect();

    json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "reference_id": checkout.order_number,
            "invoice_id": checkout.order_number,
            "custom_id": checkout.order_id.to_string(),
            "amount": {
                "currency_code": checkout.currency,
                "value": format_amount(checkout.total_cents),
                "breakdown": {
                    "item_total": money(checkout.subtotal_cents),
                    "shipping": money(checkout.shipping_cents),
                    "tax_total": money(checkout.tax_cents),
                }
            },
            "items": items,
        }],
        "payment_source": {
            "paypal": {
                "experience_context": {
                    "user_action": "PAY_NOW",
                    "return_url": checkout.success_url,
                    "cancel_url": checkout.cancel_url,
                }
            }
        }
    })
}

/// Reference and approval link of a created order or subscription.
fn session_from(created: &Value, rels: &[&str]) -> Result<CheckoutSession, GatewayError> {
    let reference = created
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Payload("response without id".to_string()))?
        .to_string();
    let redirect_url = rels
        .iter()
        .find_map(|rel| link_href(created, rel))
        .ok_or_else(|| GatewayError::Payload("response without approval link".to_string()))?;

    Ok(CheckoutSession {
        reference,
        redirect_url,
    })
}

fn link_href(value: &Value, rel: &str) -> Option<String> {
    value
        .get("links")?
        .as_array()?
        .iter()
        .find(|link| link.get("rel").and_then(Value::as_str) == Some(rel))
        .and_then(|link| link.get("href"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_capture_response(captured: &Value) -> Result<CapturedPayment, GatewayError> {
    let unit = captured
        .pointer("/purchase_units/0")
        .ok_or_else(|| GatewayError::Payload("capture without purchase unit".to_string()))?;
    let capture = unit
        .pointer("/payments/captures/0")
        .ok_or_else(|| GatewayError::Payload("capture without capture record".to_string()))?;

    let capture_id = capture
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Payload("capture without id".to_string()))?
        .to_string();
    let order_id = capture
        .get("custom_id")
        .or_else(|| unit.get("custom_id"))
        .and_then(Value::as_str)
        .and_then(|id| id.parse::<i64>().ok());

    Ok(CapturedPayment {
        capture_id,
        order_id,
        amount_cents: capture
            .pointer("/amount/value")
            .and_then(Value::as_str)
            .and_then(parse_amount),
        completed: capture.get("status").and_then(Value::as_str) == Some("COMPLETED"),
    })
}

async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status, &text));
    }
    if text.trim().is_empty() {
        // 204 from cancel
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| GatewayError::Payload(e.to_string()))
}

/// Parse a PayPal `WebhookEvent` into a provider-neutral event.
pub fn parse_paypal_event(body: &[u8]) -> Result<GatewayEvent, GatewayError> {
    let json: Value =
        serde_json::from_slice(body).map_err(|e| GatewayError::Payload(e.to_string()))?;

    let event_id = json
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Payload("event without id".to_string()))?
        .to_string();
    let event_type = json
        .get("event_type")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Payload("event without event_type".to_string()))?
        .to_string();
    let resource = json
        .get("resource")
        .ok_or_else(|| GatewayError::Payload("event without resource".to_string()))?;

    let resource_id = || {
        resource
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Payload("resource without id".to_string()))
    };

    let event = match event_type.as_str() {
        "PAYMENT.CAPTURE.COMPLETED" => {
            match resource
                .get("custom_id")
                .and_then(Value::as_str)
                .and_then(|id| id.parse::<i64>().ok())
            {
                Some(order_id) => PaymentEvent::OrderPaid {
                    order_id,
                    payment_reference: resource_id()?,
                    amount_cents: resource
                        .pointer("/amount/value")
                        .and_then(Value::as_str)
                        .and_then(parse_amount),
                },
                None => PaymentEvent::Ignored,
            }
        }
        "PAYMENT.CAPTURE.REFUNDED" => match refunded_capture_id(resource) {
            Some(payment_reference) => PaymentEvent::OrderRefunded { payment_reference },
            None => PaymentEvent::Ignored,
        },
        "BILLING.SUBSCRIPTION.ACTIVATED" => {
            let (user_id, product_id) = resource
                .get("custom_id")
                .and_then(Value::as_str)
                .and_then(parse_subscriber_ref)
                .ok_or_else(|| {
                    GatewayError::Payload("subscription without user:product custom_id".to_string())
                })?;

            PaymentEvent::SubscriptionActivated {
                gateway_subscription_id: resource_id()?,
                user_id,
                product_id,
                current_period_end: resource
                    .pointer("/billing_info/next_billing_time")
                    .and_then(Value::as_str)
                    .and_then(parse_time),
            }
        }
        "PAYMENT.SALE.COMPLETED" => match resource.get("billing_agreement_id").and_then(Value::as_str) {
            Some(agreement) => PaymentEvent::SubscriptionPaymentSucceeded {
                gateway_subscription_id: agreement.to_string(),
                gateway_payment_id: resource_id()?,
                amount_cents: resource
                    .pointer("/amount/total")
                    .and_then(Value::as_str)
                    .and_then(parse_amount)
                    .unwrap_or(0),
                currency: resource
                    .pointer("/amount/currency")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                current_period_end: None,
            },
            None => PaymentEvent::Ignored,
        },
        "BILLING.SUBSCRIPTION.PAYMENT.FAILED" | "BILLING.SUBSCRIPTION.SUSPENDED" => {
            PaymentEvent::SubscriptionPaymentFailed {
                gateway_subscription_id: resource_id()?,
            }
        }
        "BILLING.SUBSCRIPTION.CANCELLED" => PaymentEvent::SubscriptionCancelled {
            gateway_subscription_id: resource_id()?,
        },
        "BILLING.SUBSCRIPTION.EXPIRED" => PaymentEvent::SubscriptionExpired {
            gateway_subscription_id: resource_id()?,
        },
        _ => PaymentEvent::Ignored,
    };

    Ok(GatewayEvent {
        provider: PaymentProvider::PayPal,
        event_id,
        event_type,
        event,
    })
}

/// `"{user_id}:{product_id}"`
fn parse_subscriber_ref(custom_id: &str) -> Option<(i64, i64)> {
    let (user, product) = custom_id.split_once(':')?;
    Some((user.parse().ok()?, product.parse().ok()?))
}

/// A refund links back to its capture through the `up` relation.
fn refunded_capture_id(refund: &Value) -> Option<String> {
    link_href(refund, "up")?
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::payments::CheckoutLine;
    use pretty_assertions::assert_eq;

    fn event(event_type: &str, resource: Value) -> Vec<u8> {
        json!({ "id": "WH-1", "event_type": event_type, "resource": resource })
            .to_string()
            .into_bytes()
    }

    #[test]
    fn test_parse_capture_completed() {
        let body = event(
            "PAYMENT.CAPTURE.COMPLETED",
            json!({
                "id": "CAP-1",
                "custom_id": "42",
                "status": "COMPLETED",
                "amount": { "currency_code": "USD", "value": "25.99" }
            }),
        );

        let parsed = parse_paypal_event(&body).unwrap();
        assert_eq!(parsed.provider, PaymentProvider::PayPal);
        assert_eq!(parsed.event_id, "WH-1");
        assert_eq!(
            parsed.event,
            PaymentEvent::OrderPaid {
                order_id: 42,
                payment_reference: "CAP-1".to_string(),
                amount_cents: Some(2599),
            }
        );
    }

    #[test]
    fn test_parse_refund_uses_capture_link() {
        let body = event(
            "PAYMENT.CAPTURE.REFUNDED",
            json!({
                "id": "REF-1",
                "links": [
                    { "rel": "self", "href": "https://api.paypal.com/v2/payments/refunds/REF-1" },
                    { "rel": "up", "href": "https://api.paypal.com/v2/payments/captures/CAP-1" }
                ]
            }),
        );

        assert_eq!(
            parse_paypal_event(&body).unwrap().event,
            PaymentEvent::OrderRefunded {
                payment_reference: "CAP-1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_subscription_activated() {
        let body = event(
            "BILLING.SUBSCRIPTION.ACTIVATED",
            json!({
                "id": "I-SUB1",
                "custom_id": "7:9",
                "billing_info": { "next_billing_time": "2026-02-01T10:00:00Z" }
            }),
        );

        assert_eq!(
            parse_paypal_event(&body).unwrap().event,
            PaymentEvent::SubscriptionActivated {
                gateway_subscription_id: "I-SUB1".to_string(),
                user_id: 7,
                product_id: 9,
                current_period_end: parse_time("2026-02-01T10:00:00Z"),
            }
        );
    }

    #[test]
    fn test_activation_without_subscriber_ref_is_malformed() {
        let body = event("BILLING.SUBSCRIPTION.ACTIVATED", json!({ "id": "I-SUB1" }));
        assert!(matches!(parse_paypal_event(&body), Err(GatewayError::Payload(_))));
    }

    #[test]
    fn test_parse_sale_completed() {
        let body = event(
            "PAYMENT.SALE.COMPLETED",
            json!({
                "id": "SALE-1",
                "billing_agreement_id": "I-SUB1",
                "amount": { "total": "9.99", "currency": "USD" }
            }),
        );

        assert_eq!(
            parse_paypal_event(&body).unwrap().event,
            PaymentEvent::SubscriptionPaymentSucceeded {
                gateway_subscription_id: "I-SUB1".to_string(),
                gateway_payment_id: "SALE-1".to_string(),
                amount_cents: 999,
                currency: "USD".to_string(),
                current_period_end: None,
            }
        );
    }

    #[test]
    fn test_suspension_counts_as_failed_payment() {
        let body = event("BILLING.SUBSCRIPTION.SUSPENDED", json!({ "id": "I-SUB1" }));
        assert_eq!(
            parse_paypal_event(&body).unwrap().event,
            PaymentEvent::SubscriptionPaymentFailed {
                gateway_subscription_id: "I-SUB1".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let body = event("CHECKOUT.ORDER.APPROVED", json!({ "id": "ORDER-1" }));
        assert_eq!(parse_paypal_event(&body).unwrap().event, PaymentEvent::Ignored);
    }

    #[test]
    fn test_parse_capture_response() {
        let captured = json!({
            "id": "ORDER-1",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "ORD-1",
                "payments": { "captures": [{
                    "id": "CAP-1",
                    "status": "COMPLETED",
                    "custom_id": "42",
                    "amount": { "currency_code": "USD", "value": "10.00" }
                }]}
            }]
        });

        assert_eq!(
            parse_capture_response(&captured).unwrap(),
            CapturedPayment {
                capture_id: "CAP-1".to_string(),
                order_id: Some(42),
                amount_cents: Some(1000),
                completed: true,
            }
        );
    }

    #[test]
    fn test_order_request_breakdown() {
        let checkout = OrderCheckout {
            order_id: 42,
            order_number: "ORD-1".to_string(),
            email: "a@example.com".to_string(),
            currency: "USD".to_string(),
            lines: vec![CheckoutLine {
                name: "Mug".to_string(),
                unit_amount_cents: 1250,
                quantity: 2,
            }],
            subtotal_cents: 2500,
            shipping_cents: 599,
            tax_cents: 0,
            total_cents: 3099,
            success_url: "https://shop/api/checkout/paypal/return".to_string(),
            cancel_url: "https://shop/cart".to_string(),
        };

        let request = order_request(&checkout);
        assert_eq!(request.pointer("/purchase_units/0/custom_id"), Some(&json!("42")));
        assert_eq!(request.pointer("/purchase_units/0/amount/value"), Some(&json!("30.99")));
        assert_eq!(
            request.pointer("/purchase_units/0/amount/breakdown/item_total/value"),
            Some(&json!("25.00"))
        );
        assert_eq!(request.pointer("/purchase_units/0/items/0/quantity"), Some(&json!("2")));
    }

    #[test]
    fn test_session_prefers_payer_action_link() {
        let created = json!({
            "id": "ORDER-1",
            "links": [
                { "rel": "self", "href": "https://api/orders/ORDER-1" },
                { "rel": "payer-action", "href": "https://paypal/checkoutnow?token=ORDER-1" }
            ]
        });

        let session = session_from(&created, &["payer-action", "approve"]).unwrap();
        assert_eq!(session.reference, "ORDER-1");
        assert_eq!(session.redirect_url, "https://paypal/checkoutnow?token=ORDER-1");
    }
}
