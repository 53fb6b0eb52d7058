//! Order Repository Implementation
//!
//! PostgreSQL implementation of the OrderRepository trait. Order placement
//! runs in one transaction together with the stock decrement, and payment
//! in one transaction together with the download grants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};

use super::download_repository::insert_downloads;
use crate::domain::{
    CustomerDownload, Order, OrderItem, OrderRepository, OrderStatus, PaymentProvider, ProductKind,
    ShippingAddress,
};
use crate::shared::error::AppError;

const ORDER_COLUMNS: &str = r#"
    id, order_number, user_id, email, status, payment_provider, payment_reference,
    subtotal_cents, discount_cents, shipping_cents, tax_cents, total_cents, currency,
    shipping_address, tracking_number, paid_at, shipped_at, delivered_at, refunded_at,
    created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: Option<i64>,
    email: String,
    status: String,
    payment_provider: Option<String>,
    payment_reference: Option<String>,
    subtotal_cents: i64,
    discount_cents: i64,
    shipping_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    currency: String,
    shipping_address: Option<Json<ShippingAddress>>,
    tracking_number: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            email: self.email,
            status: OrderStatus::from_str(&self.status),
            payment_provider: self.payment_provider.as_deref().and_then(PaymentProvider::parse),
            payment_reference: self.payment_reference,
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            shipping_cents: self.shipping_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            currency: self.currency,
            shipping_address: self.shipping_address.map(|Json(address)| address),
            tracking_number: self.tracking_number,
            paid_at: self.paid_at,
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
            refunded_at: self.refunded_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    product_name: String,
    kind: String,
    unit_price_cents: i64,
    quantity: i32,
    line_total_cents: i64,
}

impl OrderItemRow {
    fn into_item(self) -> OrderItem {
        OrderItem {
            id: self.id,
            order_id: self.order_id,
            product_id: self.product_id,
            product_name: self.product_name,
            kind: ProductKind::from_str(&self.kind),
            unit_price_cents: self.unit_price_cents,
            quantity: self.quantity,
            line_total_cents: self.line_total_cents,
        }
    }
}

/// PostgreSQL order repository implementation.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_with_items(&self, order: &Order, items: &[OrderItem]) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;

        // Decrement tracked stock first; any shortfall rolls back the whole order.
        for item in items {
            let reserved: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                WHERE id = $1
                  AND (stock_quantity IS NULL OR stock_quantity >= $2)
                RETURNING id
                "#,
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .fetch_optional(&mut *tx)
            .await?;

            if reserved.is_none() {
                tx.rollback().await?;
                return Err(AppError::Conflict(format!(
                    "Insufficient stock for {}",
                    item.product_name
                )));
            }
        }

        let query = format!(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, email, status, payment_provider, payment_reference,
                subtotal_cents, discount_cents, shipping_cents, tax_cents, total_cents, currency,
                shipping_address, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(order.id)
            .bind(&order.order_number)
            .bind(order.user_id)
            .bind(&order.email)
            .bind(order.status.as_str())
            .bind(order.payment_provider.map(|p| p.as_str()))
            .bind(&order.payment_reference)
            .bind(order.subtotal_cents)
            .bind(order.discount_cents)
            .bind(order.shipping_cents)
            .bind(order.tax_cents)
            .bind(order.total_cents)
            .bind(&order.currency)
            .bind(order.shipping_address.as_ref().map(Json))
            .bind(order.created_at)
            .bind(order.updated_at)
            .fetch_one(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, product_name, kind,
                    unit_price_cents, quantity, line_total_cents
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.kind.as_str())
            .bind(item.unit_price_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into_order())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, AppError> {
        let query = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_order()))
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, AppError> {
        let query = format!(
            "SELECT {} FROM orders WHERE payment_reference = $1 ORDER BY created_at DESC LIMIT 1",
            ORDER_COLUMNS
        );
        let row = sqlx::query_as::<_, OrderRow>(&query)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_order()))
    }

    async fn items(&self, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, product_name, kind,
                   unit_price_cents, quantity, line_total_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_item()).collect())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, AppError> {
        let query = format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_order()).collect())
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, AppError> {
        let query = format!(
            r#"
            SELECT {}
            FROM orders
            WHERE ($1::VARCHAR IS NULL OR status = $1::VARCHAR)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&query)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_order()).collect())
    }

    async fn set_payment_reference(
        &self,
        order_id: i64,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_provider = $2, payment_reference = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(provider.as_str())
        .bind(reference)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Order {} not found", order_id)));
        }

        Ok(())
    }

    async fn mark_paid(
        &self,
        order_id: i64,
        provider: PaymentProvider,
        reference: &str,
        status: OrderStatus,
        downloads: &[CustomerDownload],
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_provider = $3, payment_reference = $4,
                paid_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(status.as_str())
        .bind(provider.as_str())
        .bind(reference)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_downloads(&mut *tx, downloads).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn update_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3,
                tracking_number = COALESCE($4, tracking_number),
                shipped_at = CASE WHEN $3 = 'shipped' THEN NOW() ELSE shipped_at END,
                delivered_at = CASE WHEN $3 = 'delivered' THEN NOW() ELSE delivered_at END,
                refunded_at = CASE WHEN $3 = 'refunded' THEN NOW() ELSE refunded_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(order_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(tracking_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
