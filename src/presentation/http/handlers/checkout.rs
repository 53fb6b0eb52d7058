//! Checkout Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    Json,
};

use crate::application::dto::request::{PayPalReturnQuery, PlaceOrderRequest};
use crate::application::services::{
    CheckoutError, CheckoutResultDto, CheckoutService, PlaceOrderDto, ReconcileError,
    ReconciliationService,
};
use crate::domain::{PaymentEvent, PaymentProvider, ReconcileOutcome};
use crate::presentation::http::extractors::CartSession;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn map_checkout_error(e: CheckoutError) -> AppError {
    match e {
        CheckoutError::EmptyCart => AppError::BadRequest("Cart is empty".into()),
        CheckoutError::ProductUnavailable(name) => {
            AppError::Conflict(format!("{} is no longer available", name))
        }
        CheckoutError::ShippingAddressRequired => AppError::Validation(
            "A shipping address is required for physical items".into(),
        ),
        CheckoutError::NothingToPay => AppError::BadRequest("Order total must be positive".into()),
        CheckoutError::InsufficientStock(msg) => AppError::Conflict(msg),
        CheckoutError::OrderNotFound => AppError::NotFound("Order not found".into()),
        CheckoutError::PaymentNotCompleted => {
            AppError::BadRequest("Payment was not completed".into())
        }
        CheckoutError::Gateway(e) => e.into(),
        CheckoutError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Place an order from the cart and start the gateway checkout
pub async fn place_order(
    State(state): State<AppState>,
    CartSession(owner): CartSession,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutResultDto>), AppError> {
    validate(&body)?;

    let request = PlaceOrderDto {
        email: body.email.trim().to_lowercase(),
        shipping_address: body.shipping_address.map(Into::into),
        provider: body.provider,
    };

    let result = state
        .checkout_service()
        .place_order(&owner, request)
        .await
        .map_err(map_checkout_error)?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Buyer returns from PayPal approval: capture and reconcile
pub async fn paypal_return(
    State(state): State<AppState>,
    Query(query): Query<PayPalReturnQuery>,
) -> Result<Redirect, AppError> {
    tracing::info!(
        paypal_order_id = %query.token,
        payer_id = ?query.payer_id,
        "PayPal buyer returned"
    );

    let event = state
        .checkout_service()
        .capture_paypal_return(&query.token)
        .await
        .map_err(map_checkout_error)?;

    let outcome = state
        .reconciliation_service()
        .apply(PaymentProvider::PayPal, &event)
        .await
        .map_err(|ReconcileError::Store(e)| e)?;

    let base = state.settings.store.public_base_url.trim_end_matches('/');
    Ok(Redirect::to(&return_location(base, &event, outcome)))
}

fn return_location(base: &str, event: &PaymentEvent, outcome: ReconcileOutcome) -> String {
    let order = match event {
        PaymentEvent::OrderPaid { order_id, .. } => order_id.to_string(),
        _ => String::new(),
    };
    format!(
        "{}/checkout/success?order_id={}&outcome={}",
        base,
        order,
        outcome.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_location() {
        let event = PaymentEvent::OrderPaid {
            order_id: 77,
            payment_reference: "CAP-1".into(),
            amount_cents: Some(1000),
        };
        assert_eq!(
            return_location("https://shop.test", &event, ReconcileOutcome::Applied),
            "https://shop.test/checkout/success?order_id=77&outcome=applied"
        );
    }
}
