//! Catalog Service
//!
//! Public product browsing and store-admin product management.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{BillingInterval, Product, ProductKind, ProductRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Upper bound for a unit price. Keeps line totals far from `i64` overflow
/// at the largest cart quantity.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;

/// Catalog service trait
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Active products, optionally of one kind
    async fn list_products(&self, kind: Option<ProductKind>) -> Result<Vec<Product>, CatalogError>;

    /// Active product by slug, or by id when the path is numeric
    async fn get_product(&self, slug_or_id: &str) -> Result<Product, CatalogError>;

    /// Every product including inactive ones
    async fn admin_list(&self, kind: Option<ProductKind>) -> Result<Vec<Product>, CatalogError>;

    async fn create_product(&self, request: CreateProductDto) -> Result<Product, CatalogError>;

    async fn update_product(&self, id: i64, update: UpdateProductDto) -> Result<Product, CatalogError>;

    /// Hide a product from the catalog and from new carts
    async fn deactivate(&self, id: i64) -> Result<(), CatalogError>;

    /// Set tracked stock to an absolute level (`None` stops tracking)
    async fn set_stock(&self, id: i64, quantity: Option<i32>) -> Result<Product, CatalogError>;

    /// Add `delta` to tracked stock; returns the new level
    async fn adjust_stock(&self, id: i64, delta: i32) -> Result<i32, CatalogError>;
}

/// Create product request
#[derive(Debug, Clone)]
pub struct CreateProductDto {
    pub sku: String,
    pub slug: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub kind: ProductKind,
    pub price_cents: i64,
    pub member_price_cents: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub billing_interval: Option<BillingInterval>,
    pub stripe_price_id: Option<String>,
    pub paypal_plan_id: Option<String>,
    pub digital_file_path: Option<String>,
}

/// Update product request; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UpdateProductDto {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub member_price_cents: Option<i64>,
    pub billing_interval: Option<BillingInterval>,
    pub stripe_price_id: Option<String>,
    pub paypal_plan_id: Option<String>,
    pub digital_file_path: Option<String>,
    pub is_active: Option<bool>,
}

/// Catalog service errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Product not found")]
    NotFound,

    #[error("SKU or slug already in use")]
    Duplicate,

    #[error("Invalid product: {0}")]
    Invalid(String),

    #[error("Stock cannot go below zero")]
    InsufficientStock,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// CatalogService implementation
pub struct CatalogServiceImpl<P>
where
    P: ProductRepository,
{
    product_repo: Arc<P>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<P> CatalogServiceImpl<P>
where
    P: ProductRepository,
{
    pub fn new(product_repo: Arc<P>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            product_repo,
            id_generator,
        }
    }

    async fn load(&self, id: i64) -> Result<Product, CatalogError> {
        self.product_repo
            .find_by_id(id)
            .await
            .map_err(|e| CatalogError::Internal(e.to_string()))?
            .ok_or(CatalogError::NotFound)
    }
}

/// Kind-specific field rules shared by create and update.
fn check_product(product: &Product) -> Result<(), CatalogError> {
    if !(0..=MAX_PRICE_CENTS).contains(&product.price_cents) {
        return Err(CatalogError::Invalid(format!(
            "price must be between 0 and {}",
            MAX_PRICE_CENTS
        )));
    }
    if let Some(member_price) = product.member_price_cents {
        if !(0..=MAX_PRICE_CENTS).contains(&member_price) {
            return Err(CatalogError::Invalid(format!(
                "member price must be between 0 and {}",
                MAX_PRICE_CENTS
            )));
        }
    }
    if product.stock_quantity.is_some_and(|s| s < 0) {
        return Err(CatalogError::Invalid("stock cannot be negative".into()));
    }
    match product.kind {
        ProductKind::Subscription => {
            if product.billing_interval.is_none() {
                return Err(CatalogError::Invalid(
                    "subscription products need a billing interval".into(),
                ));
            }
            if product.stripe_price_id.is_none() && product.paypal_plan_id.is_none() {
                return Err(CatalogError::Invalid(
                    "subscription products need a Stripe price id or a PayPal plan id".into(),
                ));
            }
        }
        ProductKind::Digital => {
            if product.digital_file_path.is_none() {
                return Err(CatalogError::Invalid(
                    "digital products need a file path".into(),
                ));
            }
        }
        ProductKind::Physical => {}
    }
    Ok(())
}

fn map_write_error(e: AppError) -> CatalogError {
    match e {
        AppError::Conflict(_) => CatalogError::Duplicate,
        AppError::NotFound(_) => CatalogError::NotFound,
        e => CatalogError::Internal(e.to_string()),
    }
}

#[async_trait]
impl<P> CatalogService for CatalogServiceImpl<P>
where
    P: ProductRepository + 'static,
{
    async fn list_products(&self, kind: Option<ProductKind>) -> Result<Vec<Product>, CatalogError> {
        self.product_repo
            .list(true, kind)
            .await
            .map_err(|e| CatalogError::Internal(e.to_string()))
    }

    async fn get_product(&self, slug_or_id: &str) -> Result<Product, CatalogError> {
        let found = match slug_or_id.parse::<i64>() {
            Ok(id) => self.product_repo.find_by_id(id).await,
            Err(_) => self.product_repo.find_by_slug(slug_or_id).await,
        }
        .map_err(|e| CatalogError::Internal(e.to_string()))?;

        found.filter(|p| p.is_active).ok_or(CatalogError::NotFound)
    }

    async fn admin_list(&self, kind: Option<ProductKind>) -> Result<Vec<Product>, CatalogError> {
        self.product_repo
            .list(false, kind)
            .await
            .map_err(|e| CatalogError::Internal(e.to_string()))
    }

    #[tracing::instrument(skip(self, request), fields(sku = %request.sku))]
    async fn create_product(&self, request: CreateProductDto) -> Result<Product, CatalogError> {
        let slug = request
            .slug
            .map(|s| Product::slugify(&s))
            .unwrap_or_else(|| Product::slugify(&request.name));
        if slug.is_empty() {
            return Err(CatalogError::Invalid("slug cannot be empty".into()));
        }

        let now = Utc::now();
        let product = Product {
            id: self.id_generator.generate(),
            sku: request.sku,
            slug,
            name: request.name,
            description: request.description,
            kind: request.kind,
            price_cents: request.price_cents,
            member_price_cents: request.member_price_cents,
            // stock only makes sense for goods that ship
            stock_quantity: if request.kind == ProductKind::Physical {
                request.stock_quantity
            } else {
                None
            },
            billing_interval: request.billing_interval,
            stripe_price_id: request.stripe_price_id,
            paypal_plan_id: request.paypal_plan_id,
            digital_file_path: request.digital_file_path,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        check_product(&product)?;

        let created = self
            .product_repo
            .create(&product)
            .await
            .map_err(map_write_error)?;

        tracing::info!(product_id = created.id, "Product created");
        Ok(created)
    }

    async fn update_product(&self, id: i64, update: UpdateProductDto) -> Result<Product, CatalogError> {
        let mut product = self.load(id).await?;

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = Some(description);
        }
        if let Some(price) = update.price_cents {
            product.price_cents = price;
        }
        if let Some(member_price) = update.member_price_cents {
            // negative clears the member price
            product.member_price_cents = (member_price >= 0).then_some(member_price);
        }
        if let Some(interval) = update.billing_interval {
            product.billing_interval = Some(interval);
        }
        if let Some(price_id) = update.stripe_price_id {
            product.stripe_price_id = Some(price_id);
        }
        if let Some(plan_id) = update.paypal_plan_id {
            product.paypal_plan_id = Some(plan_id);
        }
        if let Some(path) = update.digital_file_path {
            product.digital_file_path = Some(path);
        }
        if let Some(active) = update.is_active {
            product.is_active = active;
        }
        check_product(&product)?;

        self.product_repo
            .update(&product)
            .await
            .map_err(map_write_error)
    }

    async fn deactivate(&self, id: i64) -> Result<(), CatalogError> {
        self.product_repo
            .set_active(id, false)
            .await
            .map_err(map_write_error)
    }

    async fn set_stock(&self, id: i64, quantity: Option<i32>) -> Result<Product, CatalogError> {
        if quantity.is_some_and(|q| q < 0) {
            return Err(CatalogError::InsufficientStock);
        }

        let mut product = self.load(id).await?;
        if product.kind != ProductKind::Physical && quantity.is_some() {
            return Err(CatalogError::Invalid(
                "only physical products track stock".into(),
            ));
        }
        product.stock_quantity = quantity;

        self.product_repo
            .update(&product)
            .await
            .map_err(map_write_error)
    }

    async fn adjust_stock(&self, id: i64, delta: i32) -> Result<i32, CatalogError> {
        self.product_repo
            .adjust_stock(id, delta)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => CatalogError::InsufficientStock,
                AppError::NotFound(_) => CatalogError::NotFound,
                AppError::BadRequest(msg) => CatalogError::Invalid(msg),
                e => CatalogError::Internal(e.to_string()),
            })
    }
}
