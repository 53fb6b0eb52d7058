//! Product Repository Implementation
//!
//! PostgreSQL implementation of the ProductRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{BillingInterval, Product, ProductKind, ProductRepository};
use crate::shared::error::AppError;

const PRODUCT_COLUMNS: &str = r#"
    id, sku, slug, name, description, kind, price_cents, member_price_cents,
    stock_quantity, billing_interval, stripe_price_id, paypal_plan_id,
    digital_file_path, is_active, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    sku: String,
    slug: String,
    name: String,
    description: Option<String>,
    kind: String,
    price_cents: i64,
    member_price_cents: Option<i64>,
    stock_quantity: Option<i32>,
    billing_interval: Option<String>,
    stripe_price_id: Option<String>,
    paypal_plan_id: Option<String>,
    digital_file_path: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            id: self.id,
            sku: self.sku,
            slug: self.slug,
            name: self.name,
            description: self.description,
            kind: ProductKind::from_str(&self.kind),
            price_cents: self.price_cents,
            member_price_cents: self.member_price_cents,
            stock_quantity: self.stock_quantity,
            billing_interval: self
                .billing_interval
                .as_deref()
                .and_then(BillingInterval::from_str),
            stripe_price_id: self.stripe_price_id,
            paypal_plan_id: self.paypal_plan_id,
            digital_file_path: self.digital_file_path,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn map_unique_violation(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("A product with this SKU or slug already exists".to_string())
        }
        _ => AppError::Database(e),
    }
}

/// PostgreSQL product repository implementation.
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError> {
        let query = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_product()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, AppError> {
        let query = format!("SELECT {} FROM products WHERE slug = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_product()))
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS);
        let rows = sqlx::query_as::<_, ProductRow>(&query)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_product()).collect())
    }

    async fn list(
        &self,
        active_only: bool,
        kind: Option<ProductKind>,
    ) -> Result<Vec<Product>, AppError> {
        let query = format!(
            r#"
            SELECT {}
            FROM products
            WHERE ($1 = FALSE OR is_active = TRUE)
              AND ($2::VARCHAR IS NULL OR kind = $2::VARCHAR)
            ORDER BY name ASC
            "#,
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&query)
            .bind(active_only)
            .bind(kind.map(|k| k.as_str()))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_product()).collect())
    }

    async fn create(&self, product: &Product) -> Result<Product, AppError> {
        let query = format!(
            r#"
            INSERT INTO products (
                id, sku, slug, name, description, kind, price_cents, member_price_cents,
                stock_quantity, billing_interval, stripe_price_id, paypal_plan_id,
                digital_file_path, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(product.id)
            .bind(&product.sku)
            .bind(&product.slug)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.kind.as_str())
            .bind(product.price_cents)
            .bind(product.member_price_cents)
            .bind(product.stock_quantity)
            .bind(product.billing_interval.map(|b| b.as_str()))
            .bind(&product.stripe_price_id)
            .bind(&product.paypal_plan_id)
            .bind(&product.digital_file_path)
            .bind(product.is_active)
            .bind(product.created_at)
            .bind(product.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)?;

        Ok(row.into_product())
    }

    async fn update(&self, product: &Product) -> Result<Product, AppError> {
        let query = format!(
            r#"
            UPDATE products
            SET sku = $2, slug = $3, name = $4, description = $5, price_cents = $6,
                member_price_cents = $7, stock_quantity = $8, billing_interval = $9,
                stripe_price_id = $10, paypal_plan_id = $11, digital_file_path = $12,
                is_active = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&query)
            .bind(product.id)
            .bind(&product.sku)
            .bind(&product.slug)
            .bind(&product.name)
            .bind(&product.description)
            .bind(product.price_cents)
            .bind(product.member_price_cents)
            .bind(product.stock_quantity)
            .bind(product.billing_interval.map(|b| b.as_str()))
            .bind(&product.stripe_price_id)
            .bind(&product.paypal_plan_id)
            .bind(&product.digital_file_path)
            .bind(product.is_active)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_violation)?
            .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product.id)))?;

        Ok(row.into_product())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE products SET is_active = $2, updated_at = NOW() WHERE id = $1"#,
        )
        .bind(id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Product {} not found", id)));
        }

        Ok(())
    }

    async fn adjust_stock(&self, id: i64, delta: i32) -> Result<i32, AppError> {
        // Conditional update keeps stock non-negative under concurrency.
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
              AND stock_quantity IS NOT NULL
              AND stock_quantity + $2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(stock) = updated {
            return Ok(stock);
        }

        let current: Option<Option<i32>> =
            sqlx::query_scalar(r#"SELECT stock_quantity FROM products WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(AppError::NotFound(format!("Product {} not found", id))),
            Some(None) => Err(AppError::BadRequest(
                "Stock is not tracked for this product".to_string(),
            )),
            Some(Some(stock)) => Err(AppError::Conflict(format!(
                "Insufficient stock: {} available",
                stock
            ))),
        }
    }
}
