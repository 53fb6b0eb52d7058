//! Order entities and repository trait.
//!
//! Maps to the `orders` and `order_items` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::download::CustomerDownload;
use super::product::ProductKind;
use crate::domain::value_objects::{OrderStatus, PaymentProvider};
use crate::shared::error::AppError;

/// Postal address an order ships to. Stored as JSONB on the order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

/// A purchase record.
///
/// Maps to the `orders` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - order_number: VARCHAR(32) NOT NULL UNIQUE (human-facing)
/// - user_id: BIGINT NULL REFERENCES users(id) (NULL for guest checkout)
/// - email: VARCHAR(255) NOT NULL
/// - status: VARCHAR(20) NOT NULL DEFAULT 'pending'
/// - payment_provider / payment_reference: VARCHAR NULL
/// - subtotal/discount/shipping/tax/total_cents: BIGINT NOT NULL
/// - currency: CHAR(3) NOT NULL
/// - shipping_address: JSONB NULL
/// - tracking_number: VARCHAR NULL
/// - paid_at / shipped_at / delivered_at / refunded_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: Option<i64>,
    pub email: String,
    pub status: OrderStatus,
    pub payment_provider: Option<PaymentProvider>,
    pub payment_reference: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub currency: String,
    pub shipping_address: Option<ShippingAddress>,
    pub tracking_number: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Generate a human-facing order number such as `ORD-20260119-4K7Q2M`.
    pub fn generate_order_number(now: DateTime<Utc>) -> String {
        const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
        let mut rng = rand::rng();
        let suffix: String = (0..6)
            .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
            .collect();
        format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
    }

    /// Whether the signed-in user placed the order.
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == Some(user_id)
    }
}

/// A line of an order, snapshotting name and price at purchase time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub kind: ProductKind,
    pub unit_price_cents: i64,
    pub quantity: i32,
    pub line_total_cents: i64,
}

/// Paid-state target for an order with these items.
pub fn paid_status_for(items: &[OrderItem]) -> OrderStatus {
    if items.iter().any(|item| item.kind == ProductKind::Physical) {
        OrderStatus::Processing
    } else {
        OrderStatus::Completed
    }
}

/// Repository trait for Order data access operations.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert an order with its items in one transaction, decrementing
    /// tracked stock for every item. Fails with `Conflict` when any product
    /// lacks stock; nothing is written in that case.
    async fn create_with_items(&self, order: &Order, items: &[OrderItem]) -> Result<Order, AppError>;

    /// Find an order by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, AppError>;

    /// Find an order by gateway payment reference (capture / payment intent / session id).
    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, AppError>;

    /// Items of an order.
    async fn items(&self, order_id: i64) -> Result<Vec<OrderItem>, AppError>;

    /// Orders placed by a user, newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, AppError>;

    /// Orders filtered by status, newest first.
    async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, AppError>;

    /// Remember which gateway checkout belongs to an order.
    async fn set_payment_reference(
        &self,
        order_id: i64,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<(), AppError>;

    /// Move a pending order into a paid status and store its download
    /// grants in the same transaction.
    ///
    /// Conditional on the order still being pending; returns false when
    /// another delivery already marked it. A failed grant insert leaves the
    /// order pending.
    async fn mark_paid(
        &self,
        order_id: i64,
        provider: PaymentProvider,
        reference: &str,
        status: OrderStatus,
        downloads: &[CustomerDownload],
    ) -> Result<bool, AppError>;

    /// Move an order from `from` to `to`, stamping the matching timestamp.
    ///
    /// Conditional on the current status being `from`.
    async fn update_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, AppError>;
}
