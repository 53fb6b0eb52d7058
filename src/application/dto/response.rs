//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::{AuthTokens, ProfileDto};
use crate::domain::{Product, User};

/// Registration / login response (profile plus token)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl AuthResponse {
    pub fn new(user: User, tokens: AuthTokens) -> Self {
        Self {
            user: UserResponse::from(user),
            access_token: tokens.access_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            display_name: user.display_name,
            role: user.role.as_str().to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Profile response
pub type ProfileResponse = ProfileDto;

/// Product response. Ids are strings so JavaScript clients keep full precision.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: String,
    pub price_cents: i64,
    pub member_price_cents: Option<i64>,
    pub in_stock: bool,
    pub stock_quantity: Option<i32>,
    pub billing_interval: Option<String>,
    pub is_active: bool,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id.to_string(),
            in_stock: p.has_stock_for(1),
            sku: p.sku,
            slug: p.slug,
            name: p.name,
            description: p.description,
            kind: p.kind.as_str().to_string(),
            price_cents: p.price_cents,
            member_price_cents: p.member_price_cents,
            stock_quantity: p.stock_quantity,
            billing_interval: p.billing_interval.map(|i| i.as_str().to_string()),
            is_active: p.is_active,
        }
    }
}

/// Stock level after an adjustment
#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub product_id: String,
    pub stock_quantity: i32,
}

/// Outcome of an action endpoint
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Acknowledgement returned to payment providers
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}
