//! Order Handlers
//!
//! Customer order history and admin fulfilment.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Extension, Json,
};

use crate::application::dto::request::{OrderListQuery, ShipOrderRequest};
use crate::application::services::{OrderDetailDto, OrderError, OrderService};
use crate::domain::{Order, OrderStatus};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

use super::parse_id;

fn map_order_error(e: OrderError) -> AppError {
    match e {
        OrderError::NotFound => AppError::NotFound("Order not found".into()),
        OrderError::InvalidTransition(e) => AppError::Conflict(e.to_string()),
        OrderError::Conflict => AppError::Conflict("Order was modified concurrently".into()),
        OrderError::Internal(msg) => AppError::Internal(msg),
    }
}

fn parse_status(raw: Option<&str>) -> Result<Option<OrderStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => {
            let status = OrderStatus::from_str(s);
            if status.as_str() == s {
                Ok(Some(status))
            } else {
                Err(AppError::BadRequest(format!("Unknown order status: {}", s)))
            }
        }
    }
}

/// The signed-in customer's orders
pub async fn list_my_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state
        .order_service()
        .list_for_user(auth.user_id)
        .await
        .map_err(map_order_error)?;

    Ok(Json(orders))
}

/// One of the signed-in customer's orders
pub async fn get_my_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetailDto>, AppError> {
    let order_id = parse_id(&order_id, "order")?;

    let detail = state
        .order_service()
        .get_for_user(auth.user_id, order_id)
        .await
        .map_err(map_order_error)?;

    Ok(Json(detail))
}

/// Orders in any state
pub async fn admin_list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let status = parse_status(query.status.as_deref())?;

    let orders = state
        .order_service()
        .admin_list(status, query.limit, query.offset)
        .await
        .map_err(map_order_error)?;

    Ok(Json(orders))
}

pub async fn admin_get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetailDto>, AppError> {
    let order_id = parse_id(&order_id, "order")?;

    let detail = state
        .order_service()
        .admin_get(order_id)
        .await
        .map_err(map_order_error)?;

    Ok(Json(detail))
}

/// Mark an order shipped, optionally with a tracking number
pub async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    body: Bytes,
) -> Result<Json<Order>, AppError> {
    let order_id = parse_id(&order_id, "order")?;
    let body: ShipOrderRequest = if body.is_empty() {
        ShipOrderRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?
    };
    validate(&body)?;

    let order = state
        .order_service()
        .mark_shipped(order_id, body.tracking_number)
        .await
        .map_err(map_order_error)?;

    Ok(Json(order))
}

pub async fn deliver_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order_id = parse_id(&order_id, "order")?;

    let order = state
        .order_service()
        .mark_delivered(order_id)
        .await
        .map_err(map_order_error)?;

    Ok(Json(order))
}

/// Record a refund issued outside the store
pub async fn refund_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order_id = parse_id(&order_id, "order")?;

    let order = state
        .order_service()
        .mark_refunded(order_id)
        .await
        .map_err(map_order_error)?;

    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("")).unwrap(), None);
        assert_eq!(
            parse_status(Some("shipped")).unwrap(),
            Some(OrderStatus::Shipped)
        );
        assert!(parse_status(Some("lost")).is_err());
    }
}
