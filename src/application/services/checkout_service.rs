//! Checkout Service
//!
//! Turns a cart into a pending order, reserves stock, and hands the customer
//! to the chosen payment gateway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::domain::{
    CartOwner, CartRepository, Order, OrderItem, OrderRepository, OrderStatus, PaymentEvent,
    PaymentProvider, PriceLine, PricingContext, PricingRules, PricingService, Product,
    ProductKind, ProductRepository, ShippingAddress, SubscriptionRepository,
};
use crate::infrastructure::metrics;
use crate::infrastructure::payments::{CheckoutLine, GatewayError, OrderCheckout, PaymentGateways};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Checkout service trait
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Place an order from the owner's cart and start gateway checkout
    async fn place_order(&self, owner: &CartOwner, request: PlaceOrderDto) -> Result<CheckoutResultDto, CheckoutError>;

    /// Capture an approved PayPal order; returns the payment to reconcile
    async fn capture_paypal_return(&self, paypal_order_id: &str) -> Result<PaymentEvent, CheckoutError>;
}

/// Place order request
#[derive(Debug, Clone)]
pub struct PlaceOrderDto {
    pub email: String,
    pub shipping_address: Option<ShippingAddress>,
    pub provider: PaymentProvider,
}

/// Result of a successful checkout start
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResultDto {
    pub order_id: String,
    pub order_number: String,
    pub provider: PaymentProvider,
    pub redirect_url: String,
    pub total_cents: i64,
    pub currency: String,
}

/// Where gateways send the customer back to
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub public_base_url: String,
}

impl CheckoutUrls {
    fn base(&self) -> &str {
        self.public_base_url.trim_end_matches('/')
    }

    pub fn success_url(&self, provider: PaymentProvider, order_number: &str) -> String {
        match provider {
            // PayPal orders are captured by the return handler
            PaymentProvider::PayPal => format!("{}/api/checkout/paypal/return", self.base()),
            PaymentProvider::Stripe => {
                format!("{}/checkout/success?order={}", self.base(), order_number)
            }
        }
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/cart", self.base())
    }
}

/// Checkout service errors
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0} is no longer available")]
    ProductUnavailable(String),

    #[error("A shipping address is required for physical items")]
    ShippingAddressRequired,

    #[error("Order total must be positive")]
    NothingToPay,

    #[error("{0}")]
    InsufficientStock(String),

    #[error("Order not found")]
    OrderNotFound,

    #[error("Payment was not completed")]
    PaymentNotCompleted,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// CheckoutService implementation
pub struct CheckoutServiceImpl<O, C, P, S>
where
    O: OrderRepository,
    C: CartRepository,
    P: ProductRepository,
    S: SubscriptionRepository,
{
    order_repo: Arc<O>,
    cart_repo: Arc<C>,
    product_repo: Arc<P>,
    subscription_repo: Arc<S>,
    gateways: PaymentGateways,
    id_generator: Arc<SnowflakeGenerator>,
    rules: PricingRules,
    currency: String,
    urls: CheckoutUrls,
}

impl<O, C, P, S> CheckoutServiceImpl<O, C, P, S>
where
    O: OrderRepository,
    C: CartRepository,
    P: ProductRepository,
    S: SubscriptionRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_repo: Arc<O>,
        cart_repo: Arc<C>,
        product_repo: Arc<P>,
        subscription_repo: Arc<S>,
        gateways: PaymentGateways,
        id_generator: Arc<SnowflakeGenerator>,
        rules: PricingRules,
        currency: impl Into<String>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            order_repo,
            cart_repo,
            product_repo,
            subscription_repo,
            gateways,
            id_generator,
            rules,
            currency: currency.into(),
            urls,
        }
    }

    async fn is_member(&self, owner: &CartOwner) -> Result<bool, CheckoutError> {
        match owner.user_id() {
            Some(user_id) => self
                .subscription_repo
                .has_active(user_id)
                .await
                .map_err(|e| CheckoutError::Internal(e.to_string())),
            None => Ok(false),
        }
    }
}

#[async_trait]
impl<O, C, P, S> CheckoutService for CheckoutServiceImpl<O, C, P, S>
where
    O: OrderRepository + 'static,
    C: CartRepository + 'static,
    P: ProductRepository + 'static,
    S: SubscriptionRepository + 'static,
{
    #[tracing::instrument(skip(self, owner, request), fields(provider = %request.provider))]
    async fn place_order(&self, owner: &CartOwner, request: PlaceOrderDto) -> Result<CheckoutResultDto, CheckoutError> {
        let cart = self
            .cart_repo
            .find_by_owner(owner)
            .await
            .map_err(|e| CheckoutError::Internal(e.to_string()))?
            .ok_or(CheckoutError::EmptyCart)?;
        let cart_items = self
            .cart_repo
            .items(cart.id)
            .await
            .map_err(|e| CheckoutError::Internal(e.to_string()))?;
        if cart_items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<i64> = cart_items.iter().map(|i| i.product_id).collect();
        let products: HashMap<i64, Product> = self
            .product_repo
            .find_by_ids(&ids)
            .await
            .map_err(|e| CheckoutError::Internal(e.to_string()))?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(cart_items.len());
        for item in &cart_items {
            let product = products
                .get(&item.product_id)
                .ok_or_else(|| CheckoutError::ProductUnavailable(format!("Product {}", item.product_id)))?;
            if !product.is_active || product.is_subscription() {
                return Err(CheckoutError::ProductUnavailable(product.name.clone()));
            }
            lines.push((product, item.quantity));
        }

        let needs_shipping = lines.iter().any(|(p, _)| p.kind == ProductKind::Physical);
        if needs_shipping && request.shipping_address.is_none() {
            return Err(CheckoutError::ShippingAddressRequired);
        }

        let context = PricingContext {
            is_member: self.is_member(owner).await?,
        };
        let price_lines: Vec<PriceLine> = lines
            .iter()
            .map(|(p, qty)| PriceLine::from_product(p, *qty))
            .collect();
        let totals = PricingService::calculate_totals(&price_lines, context, self.rules);
        if totals.total_cents <= 0 {
            return Err(CheckoutError::NothingToPay);
        }

        let now = Utc::now();
        let order_id = self.id_generator.generate();
        let order = Order {
            id: order_id,
            order_number: Order::generate_order_number(now),
            user_id: owner.user_id(),
            email: request.email.trim().to_lowercase(),
            status: OrderStatus::Pending,
            payment_provider: Some(request.provider),
            payment_reference: None,
            subtotal_cents: totals.subtotal_cents,
            discount_cents: totals.member_savings_cents,
            shipping_cents: totals.shipping_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
            currency: self.currency.clone(),
            shipping_address: if needs_shipping { request.shipping_address } else { None },
            tracking_number: None,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };

        let items: Vec<OrderItem> = lines
            .iter()
            .zip(&price_lines)
            .map(|((product, quantity), line)| {
                let unit = line.effective_unit_price(context);
                OrderItem {
                    id: self.id_generator.generate(),
                    order_id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    kind: product.kind,
                    unit_price_cents: unit,
                    quantity: *quantity,
                    line_total_cents: unit * i64::from(*quantity),
                }
            })
            .collect();

        let order = self
            .order_repo
            .create_with_items(&order, &items)
            .await
            .map_err(|e| match e {
                AppError::Conflict(msg) => CheckoutError::InsufficientStock(msg),
                e => CheckoutError::Internal(e.to_string()),
            })?;

        self.cart_repo
            .clear(cart.id)
            .await
            .map_err(|e| CheckoutError::Internal(e.to_string()))?;

        metrics::record_order_placed(request.provider.as_str());
        tracing::info!(
            order_id = order.id,
            order_number = %order.order_number,
            total_cents = order.total_cents,
            "Order placed"
        );

        let checkout = OrderCheckout {
            order_id: order.id,
            order_number: order.order_number.clone(),
            email: order.email.clone(),
            currency: order.currency.clone(),
            lines: items
                .iter()
                .map(|item| CheckoutLine {
                    name: item.product_name.clone(),
                    unit_amount_cents: item.unit_price_cents,
                    quantity: item.quantity,
                })
                .collect(),
            subtotal_cents: order.subtotal_cents,
            shipping_cents: order.shipping_cents,
            tax_cents: order.tax_cents,
            total_cents: order.total_cents,
            success_url: self.urls.success_url(request.provider, &order.order_number),
            cancel_url: self.urls.cancel_url(),
        };

        let session = self
            .gateways
            .get(request.provider)
            .create_order_checkout(&checkout)
            .await
            .inspect_err(|e| {
                tracing::error!(order_id = order.id, "Gateway checkout failed: {}", e);
            })?;

        self.order_repo
            .set_payment_reference(order.id, request.provider, &session.reference)
            .await
            .map_err(|e| CheckoutError::Internal(e.to_string()))?;

        Ok(CheckoutResultDto {
            order_id: order.id.to_string(),
            order_number: order.order_number,
            provider: request.provider,
            redirect_url: session.redirect_url,
            total_cents: order.total_cents,
            currency: order.currency,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn capture_paypal_return(&self, paypal_order_id: &str) -> Result<PaymentEvent, CheckoutError> {
        let captured = self
            .gateways
            .get(PaymentProvider::PayPal)
            .capture_order(paypal_order_id)
            .await?;

        if !captured.completed {
            tracing::warn!(capture_id = %captured.capture_id, "PayPal capture not completed");
            return Err(CheckoutError::PaymentNotCompleted);
        }

        let order_id = match captured.order_id {
            Some(order_id) => order_id,
            None => {
                self.order_repo
                    .find_by_payment_reference(paypal_order_id)
                    .await
                    .map_err(|e| CheckoutError::Internal(e.to_string()))?
                    .ok_or(CheckoutError::OrderNotFound)?
                    .id
            }
        };

        Ok(PaymentEvent::OrderPaid {
            order_id,
            payment_reference: captured.capture_id,
            amount_cents: captured.amount_cents,
        })
    }
}
