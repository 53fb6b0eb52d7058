//! Catalog Handlers
//!
//! Public product browsing plus admin product and stock management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::{
    AdjustStockRequest, CreateProductRequest, ProductListQuery, SetStockRequest,
    UpdateProductRequest,
};
use crate::application::dto::response::{ActionResponse, ProductResponse, StockResponse};
use crate::application::services::{
    CatalogError, CatalogService, CreateProductDto, UpdateProductDto,
};
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

use super::parse_id;

fn map_catalog_error(e: CatalogError) -> AppError {
    match e {
        CatalogError::NotFound => AppError::NotFound("Product not found".into()),
        CatalogError::Duplicate => AppError::Conflict("SKU or slug already in use".into()),
        CatalogError::Invalid(msg) => AppError::Validation(msg),
        CatalogError::InsufficientStock => {
            AppError::Conflict("Stock cannot go below zero".into())
        }
        CatalogError::Internal(msg) => AppError::Internal(msg),
    }
}

/// List active products
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = state
        .catalog_service()
        .list_products(query.kind)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// Get an active product by slug or id
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .catalog_service()
        .get_product(&slug)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(ProductResponse::from(product)))
}

/// List every product including inactive ones
pub async fn admin_list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = state
        .catalog_service()
        .admin_list(query.kind)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    validate(&body)?;

    let request = CreateProductDto {
        sku: body.sku,
        slug: body.slug,
        name: body.name,
        description: body.description,
        kind: body.kind,
        price_cents: body.price_cents,
        member_price_cents: body.member_price_cents,
        stock_quantity: body.stock_quantity,
        billing_interval: body.billing_interval,
        stripe_price_id: body.stripe_price_id,
        paypal_plan_id: body.paypal_plan_id,
        digital_file_path: body.digital_file_path,
    };

    let product = state
        .catalog_service()
        .create_product(request)
        .await
        .map_err(map_catalog_error)?;

    Ok((StatusCode::CREATED, Json(ProductResponse::from(product))))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    validate(&body)?;
    let product_id = parse_id(&product_id, "product")?;

    let update = UpdateProductDto {
        name: body.name,
        description: body.description,
        price_cents: body.price_cents,
        member_price_cents: body.member_price_cents,
        billing_interval: body.billing_interval,
        stripe_price_id: body.stripe_price_id,
        paypal_plan_id: body.paypal_plan_id,
        digital_file_path: body.digital_file_path,
        is_active: body.is_active,
    };

    let product = state
        .catalog_service()
        .update_product(product_id, update)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(ProductResponse::from(product)))
}

/// Hide a product from the catalog
pub async fn deactivate_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let product_id = parse_id(&product_id, "product")?;

    state
        .catalog_service()
        .deactivate(product_id)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(ActionResponse::ok("Product deactivated")))
}

/// Set the absolute stock level
pub async fn set_stock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(body): Json<SetStockRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let product_id = parse_id(&product_id, "product")?;
    if body.quantity.is_some_and(|q| q < 0) {
        return Err(AppError::Validation("Stock cannot be negative".into()));
    }

    let product = state
        .catalog_service()
        .set_stock(product_id, body.quantity)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(ProductResponse::from(product)))
}

/// Add to or remove from tracked stock
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Json(body): Json<AdjustStockRequest>,
) -> Result<Json<StockResponse>, AppError> {
    let id = parse_id(&product_id, "product")?;

    let stock_quantity = state
        .catalog_service()
        .adjust_stock(id, body.delta)
        .await
        .map_err(map_catalog_error)?;

    Ok(Json(StockResponse {
        product_id: id.to_string(),
        stock_quantity,
    }))
}
