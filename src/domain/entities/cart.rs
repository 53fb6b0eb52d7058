//! Shopping cart entities and repository trait.
//!
//! Maps to the `shopping_carts` and `cart_items` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartOwner {
    /// A signed-in customer.
    User(i64),
    /// An anonymous visitor identified by an opaque session token.
    Guest(String),
}

impl CartOwner {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }
}

/// A shopping cart.
///
/// Exactly one of `user_id` / `session_token` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub id: i64,
    pub user_id: Option<i64>,
    pub session_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShoppingCart {
    /// Create an empty cart for an owner.
    pub fn new(id: i64, owner: &CartOwner) -> Self {
        let now = Utc::now();
        let (user_id, session_token) = match owner {
            CartOwner::User(user_id) => (Some(*user_id), None),
            CartOwner::Guest(token) => (None, Some(token.clone())),
        };
        Self {
            id,
            user_id,
            session_token,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One product line in a cart. `(cart_id, product_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// Repository trait for cart data access operations.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Find the cart that belongs to an owner.
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<ShoppingCart>, AppError>;

    /// Create a new cart.
    async fn create(&self, cart: &ShoppingCart) -> Result<ShoppingCart, AppError>;

    /// All items of a cart, oldest first.
    async fn items(&self, cart_id: i64) -> Result<Vec<CartItem>, AppError>;

    /// Insert an item or overwrite the quantity of the existing line for
    /// the same product.
    async fn upsert_item(&self, item: &CartItem) -> Result<CartItem, AppError>;

    /// Remove a product line. Returns false if it was not in the cart.
    async fn remove_item(&self, cart_id: i64, product_id: i64) -> Result<bool, AppError>;

    /// Remove every line of a cart.
    async fn clear(&self, cart_id: i64) -> Result<(), AppError>;

    /// Delete a cart and its lines.
    async fn delete(&self, cart_id: i64) -> Result<(), AppError>;
}
