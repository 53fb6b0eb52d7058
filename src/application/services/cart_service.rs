//! Cart Service
//!
//! Guest and customer carts. Totals are recomputed on every read with member
//! pricing applied when the customer owns an active subscription.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::domain::{
    CartItem, CartOwner, CartRepository, CartTotals, PriceLine, PricingContext, PricingRules,
    PricingService, Product, ProductKind, ProductRepository, ShoppingCart, SubscriptionRepository,
};
use crate::shared::snowflake::SnowflakeGenerator;

/// Cart service trait
#[async_trait]
pub trait CartService: Send + Sync {
    /// Lines and totals of the owner's cart (empty when none exists yet)
    async fn view(&self, owner: &CartOwner) -> Result<CartView, CartError>;

    /// Add `quantity` units of a product
    async fn add_item(&self, owner: &CartOwner, product_id: i64, quantity: i32) -> Result<CartView, CartError>;

    /// Overwrite a line's quantity; 0 removes the line
    async fn set_quantity(&self, owner: &CartOwner, product_id: i64, quantity: i32) -> Result<CartView, CartError>;

    async fn remove_item(&self, owner: &CartOwner, product_id: i64) -> Result<CartView, CartError>;

    async fn clear(&self, owner: &CartOwner) -> Result<(), CartError>;

    /// Move a guest cart into the user's cart at sign-in
    async fn merge(&self, guest_token: &str, user_id: i64) -> Result<CartView, CartError>;
}

/// One priced cart line
#[derive(Debug, Clone, Serialize)]
pub struct CartLineDto {
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub kind: ProductKind,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub effective_unit_price_cents: i64,
    pub line_total_cents: i64,
    /// Tracked stock left, `None` when untracked
    pub stock_available: Option<i32>,
}

/// Cart with totals
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    /// Guest session token; clients send it back as `X-Cart-Token`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_token: Option<String>,
    pub items: Vec<CartLineDto>,
    pub totals: CartTotals,
    pub is_member: bool,
    pub currency: String,
}

/// Cart service errors
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Product is not available")]
    ProductUnavailable,

    #[error("Subscriptions are purchased through subscription checkout")]
    SubscriptionNotAllowed,

    #[error("Only {available} in stock")]
    InsufficientStock { available: i32 },

    #[error("Quantity must be positive")]
    InvalidQuantity,

    #[error("Item not in cart")]
    ItemNotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// CartService implementation
pub struct CartServiceImpl<C, P, S>
where
    C: CartRepository,
    P: ProductRepository,
    S: SubscriptionRepository,
{
    cart_repo: Arc<C>,
    product_repo: Arc<P>,
    subscription_repo: Arc<S>,
    id_generator: Arc<SnowflakeGenerator>,
    rules: PricingRules,
    currency: String,
}

impl<C, P, S> CartServiceImpl<C, P, S>
where
    C: CartRepository,
    P: ProductRepository,
    S: SubscriptionRepository,
{
    pub fn new(
        cart_repo: Arc<C>,
        product_repo: Arc<P>,
        subscription_repo: Arc<S>,
        id_generator: Arc<SnowflakeGenerator>,
        rules: PricingRules,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            cart_repo,
            product_repo,
            subscription_repo,
            id_generator,
            rules,
            currency: currency.into(),
        }
    }

    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<ShoppingCart>, CartError> {
        self.cart_repo
            .find_by_owner(owner)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))
    }

    async fn find_or_create_cart(&self, owner: &CartOwner) -> Result<ShoppingCart, CartError> {
        if let Some(cart) = self.find_cart(owner).await? {
            return Ok(cart);
        }

        let cart = ShoppingCart::new(self.id_generator.generate(), owner);
        self.cart_repo
            .create(&cart)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))
    }

    async fn is_member(&self, owner: &CartOwner) -> Result<bool, CartError> {
        match owner.user_id() {
            Some(user_id) => self
                .subscription_repo
                .has_active(user_id)
                .await
                .map_err(|e| CartError::Internal(e.to_string())),
            None => Ok(false),
        }
    }

    async fn sellable_product(&self, product_id: i64) -> Result<Product, CartError> {
        let product = self
            .product_repo
            .find_by_id(product_id)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))?
            .ok_or(CartError::ProductNotFound)?;

        if !product.is_active {
            return Err(CartError::ProductUnavailable);
        }
        if product.is_subscription() {
            return Err(CartError::SubscriptionNotAllowed);
        }
        Ok(product)
    }

    async fn upsert(&self, cart_id: i64, product_id: i64, quantity: i32) -> Result<(), CartError> {
        let item = CartItem {
            id: self.id_generator.generate(),
            cart_id,
            product_id,
            quantity,
            added_at: Utc::now(),
        };
        self.cart_repo
            .upsert_item(&item)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn current_quantity(&self, cart_id: i64, product_id: i64) -> Result<i32, CartError> {
        let items = self
            .cart_repo
            .items(cart_id)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))?;
        Ok(items
            .iter()
            .find(|i| i.product_id == product_id)
            .map(|i| i.quantity)
            .unwrap_or(0))
    }

    /// Price the items of a cart. Lines whose product vanished are dropped.
    async fn build_view(&self, owner: &CartOwner, cart: Option<&ShoppingCart>) -> Result<CartView, CartError> {
        let is_member = self.is_member(owner).await?;
        let cart_token = match owner {
            CartOwner::Guest(token) => Some(token.clone()),
            CartOwner::User(_) => None,
        };

        let items = match cart {
            Some(cart) => self
                .cart_repo
                .items(cart.id)
                .await
                .map_err(|e| CartError::Internal(e.to_string()))?,
            None => Vec::new(),
        };

        let ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        let products: HashMap<i64, Product> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.product_repo
                .find_by_ids(&ids)
                .await
                .map_err(|e| CartError::Internal(e.to_string()))?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let context = PricingContext { is_member };
        let mut lines = Vec::with_capacity(items.len());
        let mut price_lines = Vec::with_capacity(items.len());
        for item in &items {
            let Some(product) = products.get(&item.product_id) else {
                continue;
            };
            let price_line = PriceLine::from_product(product, item.quantity);
            let effective = price_line.effective_unit_price(context);
            lines.push(CartLineDto {
                product_id: product.id.to_string(),
                name: product.name.clone(),
                slug: product.slug.clone(),
                kind: product.kind,
                quantity: item.quantity,
                unit_price_cents: product.price_cents,
                effective_unit_price_cents: effective,
                line_total_cents: effective * i64::from(item.quantity),
                stock_available: product.stock_quantity,
            });
            price_lines.push(price_line);
        }

        Ok(CartView {
            cart_token,
            items: lines,
            totals: PricingService::calculate_totals(&price_lines, context, self.rules),
            is_member,
            currency: self.currency.clone(),
        })
    }
}

#[async_trait]
impl<C, P, S> CartService for CartServiceImpl<C, P, S>
where
    C: CartRepository + 'static,
    P: ProductRepository + 'static,
    S: SubscriptionRepository + 'static,
{
    async fn view(&self, owner: &CartOwner) -> Result<CartView, CartError> {
        let cart = self.find_cart(owner).await?;
        self.build_view(owner, cart.as_ref()).await
    }

    async fn add_item(&self, owner: &CartOwner, product_id: i64, quantity: i32) -> Result<CartView, CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity);
        }

        let product = self.sellable_product(product_id).await?;
        let cart = self.find_or_create_cart(owner).await?;

        let wanted = self.current_quantity(cart.id, product_id).await? + quantity;
        if !product.has_stock_for(wanted) {
            return Err(CartError::InsufficientStock {
                available: product.stock_quantity.unwrap_or(0),
            });
        }

        self.upsert(cart.id, product_id, wanted).await?;
        self.build_view(owner, Some(&cart)).await
    }

    async fn set_quantity(&self, owner: &CartOwner, product_id: i64, quantity: i32) -> Result<CartView, CartError> {
        if quantity < 0 {
            return Err(CartError::InvalidQuantity);
        }
        if quantity == 0 {
            return self.remove_item(owner, product_id).await;
        }

        let product = self.sellable_product(product_id).await?;
        if !product.has_stock_for(quantity) {
            return Err(CartError::InsufficientStock {
                available: product.stock_quantity.unwrap_or(0),
            });
        }

        let cart = self.find_or_create_cart(owner).await?;
        self.upsert(cart.id, product_id, quantity).await?;
        self.build_view(owner, Some(&cart)).await
    }

    async fn remove_item(&self, owner: &CartOwner, product_id: i64) -> Result<CartView, CartError> {
        let cart = self.find_cart(owner).await?.ok_or(CartError::ItemNotFound)?;

        let removed = self
            .cart_repo
            .remove_item(cart.id, product_id)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))?;
        if !removed {
            return Err(CartError::ItemNotFound);
        }

        self.build_view(owner, Some(&cart)).await
    }

    async fn clear(&self, owner: &CartOwner) -> Result<(), CartError> {
        if let Some(cart) = self.find_cart(owner).await? {
            self.cart_repo
                .clear(cart.id)
                .await
                .map_err(|e| CartError::Internal(e.to_string()))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, guest_token))]
    async fn merge(&self, guest_token: &str, user_id: i64) -> Result<CartView, CartError> {
        let user_owner = CartOwner::User(user_id);
        let guest_owner = CartOwner::Guest(guest_token.to_string());

        let Some(guest_cart) = self.find_cart(&guest_owner).await? else {
            return self.view(&user_owner).await;
        };
        let guest_items = self
            .cart_repo
            .items(guest_cart.id)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))?;

        let user_cart = self.find_or_create_cart(&user_owner).await?;
        let user_items = self
            .cart_repo
            .items(user_cart.id)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))?;
        let existing: HashMap<i64, i32> = user_items
            .iter()
            .map(|i| (i.product_id, i.quantity))
            .collect();

        let mut merged = 0usize;
        for item in guest_items {
            let product = match self.sellable_product(item.product_id).await {
                Ok(product) => product,
                Err(CartError::Internal(e)) => return Err(CartError::Internal(e)),
                Err(_) => continue,
            };

            let mut quantity = existing.get(&item.product_id).copied().unwrap_or(0) + item.quantity;
            if let Some(stock) = product.max_orderable() {
                quantity = quantity.min(stock);
            }
            if quantity <= 0 {
                continue;
            }

            self.upsert(user_cart.id, item.product_id, quantity).await?;
            merged += 1;
        }

        self.cart_repo
            .delete(guest_cart.id)
            .await
            .map_err(|e| CartError::Internal(e.to_string()))?;

        tracing::debug!(merged, "Merged guest cart");
        self.build_view(&user_owner, Some(&user_cart)).await
    }
}
