//! Cart Handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::application::dto::request::{AddCartItemRequest, MergeCartRequest, SetCartQuantityRequest};
use crate::application::dto::response::ActionResponse;
use crate::application::services::{CartError, CartService, CartView};
use crate::presentation::http::extractors::{is_valid_cart_token, CartSession};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

use super::parse_id;

pub(crate) fn map_cart_error(e: CartError) -> AppError {
    match e {
        CartError::ProductNotFound => AppError::NotFound("Product not found".into()),
        CartError::ItemNotFound => AppError::NotFound("Item not in cart".into()),
        CartError::ProductUnavailable => {
            AppError::BadRequest("Product is not available".into())
        }
        CartError::SubscriptionNotAllowed => AppError::BadRequest(
            "Subscriptions are purchased through subscription checkout".into(),
        ),
        CartError::InsufficientStock { available } => {
            AppError::Conflict(format!("Only {} in stock", available))
        }
        CartError::InvalidQuantity => AppError::Validation("Quantity must be positive".into()),
        CartError::Internal(msg) => AppError::Internal(msg),
    }
}

/// View the cart
pub async fn view_cart(
    State(state): State<AppState>,
    CartSession(owner): CartSession,
) -> Result<Json<CartView>, AppError> {
    let view = state.cart_service().view(&owner).await.map_err(map_cart_error)?;
    Ok(Json(view))
}

/// Add a product to the cart
pub async fn add_item(
    State(state): State<AppState>,
    CartSession(owner): CartSession,
    Json(body): Json<AddCartItemRequest>,
) -> Result<Json<CartView>, AppError> {
    validate(&body)?;
    let product_id = parse_id(&body.product_id, "product")?;

    let view = state
        .cart_service()
        .add_item(&owner, product_id, body.quantity)
        .await
        .map_err(map_cart_error)?;

    Ok(Json(view))
}

/// Set a line's quantity (0 removes it)
pub async fn set_quantity(
    State(state): State<AppState>,
    CartSession(owner): CartSession,
    Path(product_id): Path<String>,
    Json(body): Json<SetCartQuantityRequest>,
) -> Result<Json<CartView>, AppError> {
    validate(&body)?;
    let product_id = parse_id(&product_id, "product")?;

    let view = state
        .cart_service()
        .set_quantity(&owner, product_id, body.quantity)
        .await
        .map_err(map_cart_error)?;

    Ok(Json(view))
}

/// Remove a line
pub async fn remove_item(
    State(state): State<AppState>,
    CartSession(owner): CartSession,
    Path(product_id): Path<String>,
) -> Result<Json<CartView>, AppError> {
    let product_id = parse_id(&product_id, "product")?;

    let view = state
        .cart_service()
        .remove_item(&owner, product_id)
        .await
        .map_err(map_cart_error)?;

    Ok(Json(view))
}

/// Empty the cart
pub async fn clear_cart(
    State(state): State<AppState>,
    CartSession(owner): CartSession,
) -> Result<Json<ActionResponse>, AppError> {
    state.cart_service().clear(&owner).await.map_err(map_cart_error)?;
    Ok(Json(ActionResponse::ok("Cart cleared")))
}

/// Merge a guest cart into the signed-in user's cart
pub async fn merge_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<MergeCartRequest>,
) -> Result<Json<CartView>, AppError> {
    validate(&body)?;
    if !is_valid_cart_token(&body.cart_token) {
        return Err(AppError::BadRequest("Invalid cart token".into()));
    }

    let view = state
        .cart_service()
        .merge(&body.cart_token, auth.user_id)
        .await
        .map_err(map_cart_error)?;

    Ok(Json(view))
}
