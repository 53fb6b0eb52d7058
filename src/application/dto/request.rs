//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use serde::Deserialize;
use validator::Validate;

use crate::domain::{BillingInterval, PaymentProvider, ProductKind, ShippingAddress};

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: Option<String>,

    /// Guest cart to merge into the new account
    pub cart_token: Option<String>,
}

/// Product list filter
#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub kind: Option<ProductKind>,
}

/// Add to cart request
#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_id: String,

    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 999, message = "Quantity must be 1-999"))]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Set cart line quantity request (0 removes the line)
#[derive(Debug, Deserialize, Validate)]
pub struct SetCartQuantityRequest {
    #[validate(range(min = 0, max = 999, message = "Quantity must be 0-999"))]
    pub quantity: i32,
}

/// Merge guest cart request
#[derive(Debug, Deserialize, Validate)]
pub struct MergeCartRequest {
    #[validate(length(min = 1, max = 64, message = "Cart token must be 1-64 characters"))]
    pub cart_token: String,
}

/// Shipping address in a checkout request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShippingAddressRequest {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 200, message = "Address line is required"))]
    pub line1: String,

    #[validate(length(max = 200))]
    pub line2: Option<String>,

    #[validate(length(min = 1, max = 100, message = "City is required"))]
    pub city: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub region: String,

    #[validate(length(min = 1, max = 20, message = "Postal code is required"))]
    pub postal_code: String,

    #[validate(length(equal = 2, message = "Country must be an ISO 3166-1 alpha-2 code"))]
    pub country: String,

    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

impl From<ShippingAddressRequest> for ShippingAddress {
    fn from(req: ShippingAddressRequest) -> Self {
        Self {
            name: req.name,
            line1: req.line1,
            line2: req.line2,
            city: req.city,
            region: req.region,
            postal_code: req.postal_code,
            country: req.country.to_ascii_uppercase(),
            phone: req.phone,
        }
    }
}

/// Place order request
#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(nested)]
    pub shipping_address: Option<ShippingAddressRequest>,

    pub provider: PaymentProvider,
}

/// Query PayPal appends when the buyer returns from approval
#[derive(Debug, Deserialize)]
pub struct PayPalReturnQuery {
    /// PayPal order id
    pub token: String,
    #[serde(rename = "PayerID")]
    pub payer_id: Option<String>,
}

/// Start subscription request
#[derive(Debug, Deserialize)]
pub struct SubscriptionCheckoutRequest {
    pub product_id: String,
    pub provider: PaymentProvider,
}

/// Create product request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64, message = "SKU must be 1-64 characters"))]
    pub sku: String,

    #[validate(length(min = 1, max = 128, message = "Slug must be 1-128 characters"))]
    pub slug: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub description: Option<String>,

    pub kind: ProductKind,

    #[validate(range(min = 0, max = 10_000_000_000i64, message = "Price must be 0-10000000000 cents"))]
    pub price_cents: i64,

    #[validate(range(min = 0, max = 10_000_000_000i64, message = "Member price must be 0-10000000000 cents"))]
    pub member_price_cents: Option<i64>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock_quantity: Option<i32>,

    pub billing_interval: Option<BillingInterval>,
    pub stripe_price_id: Option<String>,
    pub paypal_plan_id: Option<String>,
    pub digital_file_path: Option<String>,
}

/// Update product request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[validate(range(min = 0, max = 10_000_000_000i64, message = "Price must be 0-10000000000 cents"))]
    pub price_cents: Option<i64>,

    /// A negative value removes the member price
    pub member_price_cents: Option<i64>,

    pub billing_interval: Option<BillingInterval>,
    pub stripe_price_id: Option<String>,
    pub paypal_plan_id: Option<String>,
    pub digital_file_path: Option<String>,
    pub is_active: Option<bool>,
}

/// Set absolute stock level (`null` stops tracking)
#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub quantity: Option<i32>,
}

/// Relative stock adjustment
#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i32,
}

/// Admin order list filter
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

/// Mark shipped request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ShipOrderRequest {
    #[validate(length(min = 1, max = 100, message = "Tracking number must be 1-100 characters"))]
    pub tracking_number: Option<String>,
}

/// Admin subscription list filter
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionListQuery {
    pub status: Option<String>,
}

/// Document list filter
#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    pub category: Option<String>,
}

/// Document metadata update
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 64, message = "Category must be 1-64 characters"))]
    pub category: Option<String>,

    pub is_public: Option<bool>,
}

/// New image order within an album
#[derive(Debug, Deserialize)]
pub struct ReorderGalleryRequest {
    pub image_ids: Vec<String>,
}

/// Create / update link request
#[derive(Debug, Deserialize, Validate)]
pub struct LinkRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(url(message = "Invalid URL"))]
    pub url: String,

    #[validate(length(min = 1, max = 64, message = "Category must be 1-64 characters"))]
    pub category: String,

    pub description: Option<String>,

    #[serde(default)]
    pub sort_order: i32,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Store credential request
#[derive(Debug, Deserialize, Validate)]
pub struct SetCredentialRequest {
    #[validate(length(min = 1, max = 128, message = "Key must be 1-128 characters"))]
    pub key: String,

    #[validate(length(min = 1, message = "Value cannot be empty"))]
    pub value: String,

    #[serde(default = "default_credential_category")]
    pub category: String,

    pub description: Option<String>,
}

fn default_credential_category() -> String {
    "general".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_defaults_to_one() {
        let req: AddCartItemRequest = serde_json::from_str(r#"{"product_id":"42"}"#).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_nested_address_is_validated() {
        let req: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "email": "buyer@example.com",
            "provider": "stripe",
            "shipping_address": {
                "name": "Ada",
                "line1": "1 Main St",
                "city": "Springfield",
                "postal_code": "12345",
                "country": "USA"
            }
        }))
        .unwrap();

        assert!(req.validate().is_err());
    }

    #[test]
    fn test_price_above_cap_is_rejected() {
        let req: UpdateProductRequest =
            serde_json::from_str(r#"{"price_cents":9223372036854775807}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
