//! Cart Repository Implementation
//!
//! PostgreSQL implementation of the CartRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{CartItem, CartOwner, CartRepository, ShoppingCart};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i64,
    user_id: Option<i64>,
    session_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self) -> ShoppingCart {
        ShoppingCart {
            id: self.id,
            user_id: self.user_id,
            session_token: self.session_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i64,
    cart_id: i64,
    product_id: i64,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl CartItemRow {
    fn into_item(self) -> CartItem {
        CartItem {
            id: self.id,
            cart_id: self.cart_id,
            product_id: self.product_id,
            quantity: self.quantity,
            added_at: self.added_at,
        }
    }
}

/// PostgreSQL cart repository implementation.
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<ShoppingCart>, AppError> {
        let query = sqlx::query_as::<_, CartRow>(match owner {
            CartOwner::User(_) => {
                r#"
                SELECT id, user_id, session_token, created_at, updated_at
                FROM shopping_carts
                WHERE user_id = $1
                "#
            }
            CartOwner::Guest(_) => {
                r#"
                SELECT id, user_id, session_token, created_at, updated_at
                FROM shopping_carts
                WHERE session_token = $1
                "#
            }
        });

        let query = match owner {
            CartOwner::User(user_id) => query.bind(*user_id),
            CartOwner::Guest(token) => query.bind(token.clone()),
        };

        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.into_cart()))
    }

    async fn create(&self, cart: &ShoppingCart) -> Result<ShoppingCart, AppError> {
        let row = sqlx::query_as::<_, CartRow>(
            r#"
            INSERT INTO shopping_carts (id, user_id, session_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, session_token, created_at, updated_at
            "#,
        )
        .bind(cart.id)
        .bind(cart.user_id)
        .bind(&cart.session_token)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Cart already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into_cart())
    }

    async fn items(&self, cart_id: i64) -> Result<Vec<CartItem>, AppError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            r#"
            SELECT id, cart_id, product_id, quantity, added_at
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY added_at ASC, id ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_item()).collect())
    }

    async fn upsert_item(&self, item: &CartItem) -> Result<CartItem, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, CartItemRow>(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity, added_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING id, cart_id, product_id, quantity, added_at
            "#,
        )
        .bind(item.id)
        .bind(item.cart_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.added_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(r#"UPDATE shopping_carts SET updated_at = NOW() WHERE id = $1"#)
            .bind(item.cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into_item())
    }

    async fn remove_item(&self, cart_id: i64, product_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2"#,
        )
        .bind(cart_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, cart_id: i64) -> Result<(), AppError> {
        sqlx::query(r#"DELETE FROM cart_items WHERE cart_id = $1"#)
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, cart_id: i64) -> Result<(), AppError> {
        // cart_items cascade
        sqlx::query(r#"DELETE FROM shopping_carts WHERE id = $1"#)
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
