//! Product entity and repository trait.
//!
//! Maps to the `products` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// What kind of thing a product is, which decides shipping and delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// Shipped goods; needs an address and counts toward shipping.
    Physical,
    /// Delivered through download tokens after payment.
    Digital,
    /// Recurring billing; sold through the subscription checkout only.
    Subscription,
}

impl ProductKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s {
            "digital" => Self::Digital,
            "subscription" => Self::Subscription,
            _ => Self::Physical,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Digital => "digital",
            Self::Subscription => "subscription",
        }
    }
}

/// Billing period of a subscription product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// A catalog product.
///
/// Maps to the `products` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - sku: VARCHAR(64) NOT NULL UNIQUE
/// - slug: VARCHAR(128) NOT NULL UNIQUE
/// - kind: VARCHAR(20) NOT NULL ('physical' | 'digital' | 'subscription')
/// - price_cents: BIGINT NOT NULL CHECK (price_cents >= 0)
/// - member_price_cents: BIGINT NULL
/// - stock_quantity: INTEGER NULL CHECK (stock_quantity >= 0), NULL = not tracked
/// - billing_interval: VARCHAR(10) NULL (subscriptions only)
/// - stripe_price_id / paypal_plan_id: VARCHAR NULL (subscriptions only)
/// - digital_file_path: TEXT NULL (digital only, relative to the upload dir)
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: ProductKind,
    pub price_cents: i64,
    pub member_price_cents: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub billing_interval: Option<BillingInterval>,
    #[serde(skip_serializing)]
    pub stripe_price_id: Option<String>,
    #[serde(skip_serializing)]
    pub paypal_plan_id: Option<String>,
    #[serde(skip_serializing)]
    pub digital_file_path: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit price for a customer. Members get the member price only when it
    /// is actually lower than the list price.
    pub fn unit_price_for(&self, is_member: bool) -> i64 {
        match self.member_price_cents {
            Some(member_price) if is_member && member_price < self.price_cents => member_price,
            _ => self.price_cents,
        }
    }

    /// Whether `quantity` units can be sold right now.
    pub fn has_stock_for(&self, quantity: i32) -> bool {
        match self.stock_quantity {
            Some(stock) => stock >= quantity,
            None => true,
        }
    }

    /// Upper bound on how many units a cart may hold.
    pub fn max_orderable(&self) -> Option<i32> {
        self.stock_quantity
    }

    pub fn is_physical(&self) -> bool {
        self.kind == ProductKind::Physical
    }

    pub fn is_digital(&self) -> bool {
        self.kind == ProductKind::Digital
    }

    pub fn is_subscription(&self) -> bool {
        self.kind == ProductKind::Subscription
    }

    /// Turn a display name into a URL slug ("Blue Mug (XL)" -> "blue-mug-xl").
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        let mut pending_dash = false;
        for ch in name.chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(ch.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
        slug
    }
}

/// Repository trait for Product data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Find a product by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError>;

    /// Find a product by its URL slug.
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, AppError>;

    /// Find several products at once; missing ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, AppError>;

    /// List products ordered by name.
    async fn list(
        &self,
        active_only: bool,
        kind: Option<ProductKind>,
    ) -> Result<Vec<Product>, AppError>;

    /// Create a new product.
    async fn create(&self, product: &Product) -> Result<Product, AppError>;

    /// Replace the mutable fields of a product.
    async fn update(&self, product: &Product) -> Result<Product, AppError>;

    /// Activate or deactivate a product.
    async fn set_active(&self, id: i64, active: bool) -> Result<(), AppError>;

    /// Add `delta` (may be negative) to tracked stock.
    ///
    /// Returns the new stock level. Fails with `Conflict` when the result
    /// would be negative and `BadRequest` when stock is not tracked.
    async fn adjust_stock(&self, id: i64, delta: i32) -> Result<i32, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, member: Option<i64>, stock: Option<i32>) -> Product {
        let now = Utc::now();
        Product {
            id: 1,
            sku: "SKU-1".into(),
            slug: "mug".into(),
            name: "Mug".into(),
            description: None,
            kind: ProductKind::Physical,
            price_cents: price,
            member_price_cents: member,
            stock_quantity: stock,
            billing_interval: None,
            stripe_price_id: None,
            paypal_plan_id: None,
            digital_file_path: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_member_price_applies_only_to_members_when_lower() {
        let p = product(2000, Some(1500), None);
        assert_eq!(p.unit_price_for(false), 2000);
        assert_eq!(p.unit_price_for(true), 1500);

        let misconfigured = product(2000, Some(2500), None);
        assert_eq!(misconfigured.unit_price_for(true), 2000);
    }

    #[test]
    fn test_untracked_stock_is_unlimited() {
        assert!(product(100, None, None).has_stock_for(10_000));
        assert!(product(100, None, Some(3)).has_stock_for(3));
        assert!(!product(100, None, Some(3)).has_stock_for(4));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(Product::slugify("Blue Mug (XL)"), "blue-mug-xl");
        assert_eq!(Product::slugify("  e-Book: Rust 101 "), "e-book-rust-101");
    }
}
