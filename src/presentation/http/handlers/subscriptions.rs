//! Subscription Handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

use crate::application::dto::request::{SubscriptionCheckoutRequest, SubscriptionListQuery};
use crate::application::services::{SubscriptionDetailDto, SubscriptionError, SubscriptionService};
use crate::domain::{Subscription, SubscriptionStatus};
use crate::infrastructure::payments::CheckoutSession;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

use super::parse_id;

fn map_subscription_error(e: SubscriptionError) -> AppError {
    match e {
        SubscriptionError::NotFound => AppError::NotFound("Subscription not found".into()),
        SubscriptionError::ProductNotFound => AppError::NotFound("Product not found".into()),
        SubscriptionError::NotASubscription => {
            AppError::BadRequest("Product is not a subscription".into())
        }
        SubscriptionError::ProviderNotOffered(provider) => AppError::BadRequest(format!(
            "Product is not offered through {}",
            provider
        )),
        SubscriptionError::AlreadySubscribed => AppError::Conflict(
            "You already have an active subscription to this product".into(),
        ),
        SubscriptionError::InvalidTransition(e) => AppError::Conflict(e.to_string()),
        SubscriptionError::Gateway(e) => e.into(),
        SubscriptionError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Start a hosted subscription checkout
pub async fn start_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<SubscriptionCheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutSession>), AppError> {
    let product_id = parse_id(&body.product_id, "product")?;

    let session = state
        .subscription_service()
        .start_checkout(auth.user_id, product_id, body.provider)
        .await
        .map_err(map_subscription_error)?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// The signed-in user's subscriptions
pub async fn list_my_subscriptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    let subscriptions = state
        .subscription_service()
        .list_for_user(auth.user_id)
        .await
        .map_err(map_subscription_error)?;

    Ok(Json(subscriptions))
}

/// Cancel one of the signed-in user's subscriptions
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(subscription_id): Path<String>,
) -> Result<Json<Subscription>, AppError> {
    let subscription_id = parse_id(&subscription_id, "subscription")?;

    let subscription = state
        .subscription_service()
        .cancel(auth.user_id, subscription_id)
        .await
        .map_err(map_subscription_error)?;

    Ok(Json(subscription))
}

pub async fn admin_list_subscriptions(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionListQuery>,
) -> Result<Json<Vec<Subscription>>, AppError> {
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => {
            let status = SubscriptionStatus::from_str(raw);
            if status.as_str() != raw {
                return Err(AppError::BadRequest(format!(
                    "Unknown subscription status: {}",
                    raw
                )));
            }
            Some(status)
        }
    };

    let subscriptions = state
        .subscription_service()
        .admin_list(status)
        .await
        .map_err(map_subscription_error)?;

    Ok(Json(subscriptions))
}

/// Subscription with its charge history
pub async fn admin_get_subscription(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<SubscriptionDetailDto>, AppError> {
    let subscription_id = parse_id(&subscription_id, "subscription")?;

    let detail = state
        .subscription_service()
        .admin_get(subscription_id)
        .await
        .map_err(map_subscription_error)?;

    Ok(Json(detail))
}
