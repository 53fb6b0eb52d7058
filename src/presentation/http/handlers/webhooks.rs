//! Payment Webhook Handlers
//!
//! Deliveries are verified before anything is parsed. Unmatched and ignored
//! events are still acknowledged with 200 so the provider stops retrying.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};

use crate::application::dto::response::WebhookAck;
use crate::application::services::{ReconcileError, ReconciliationService};
use crate::domain::PaymentProvider;
use crate::shared::error::AppError;
use crate::startup::AppState;

async fn handle(
    state: &AppState,
    provider: PaymentProvider,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<WebhookAck>, AppError> {
    let gateway = state.gateways.get(provider);

    gateway.verify_webhook(headers, body).await.map_err(|e| {
        tracing::warn!(provider = provider.as_str(), "Rejected webhook: {}", e);
        AppError::from(e)
    })?;

    let event = gateway.parse_webhook(body)?;
    tracing::info!(
        provider = provider.as_str(),
        event_id = %event.event_id,
        event_type = %event.event_type,
        kind = event.event.kind(),
        "Webhook received"
    );

    let outcome = state
        .reconciliation_service()
        .process(event)
        .await
        .map_err(|ReconcileError::Store(e)| e)?;

    Ok(Json(WebhookAck {
        received: true,
        outcome: outcome.as_str(),
    }))
}

/// `POST /api/StoreStripeWebhook`
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    handle(&state, PaymentProvider::Stripe, &headers, &body).await
}

/// `POST /api/store/paypal-webhook`
pub async fn paypal_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    handle(&state, PaymentProvider::PayPal, &headers, &body).await
}
