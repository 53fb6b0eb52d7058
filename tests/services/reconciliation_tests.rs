//! Webhook reconciliation against placed orders.

use pretty_assertions::assert_eq;
use storefront::application::services::{CartService, CheckoutService, PlaceOrderDto, ReconciliationService};
use storefront::domain::{
    CartOwner, GatewayEvent, OrderStatus, PaymentEvent, PaymentProvider, ProductKind, ReconcileOutcome,
};

use super::Store;
use crate::common::product;

/// Place a digital order and return its id and total.
async fn place_digital_order(store: &Store) -> (i64, i64) {
    let owner = CartOwner::Guest("guest-r".into());
    store.carts().add_item(&owner, 1, 1).await.unwrap();
    let result = store
        .checkout()
        .place_order(
            &owner,
            PlaceOrderDto {
                email: "reader@example.com".into(),
                shipping_address: None,
                provider: PaymentProvider::Stripe,
            },
        )
        .await
        .unwrap();
    (result.order_id.parse().unwrap(), result.total_cents)
}

fn paid(event_id: &str, order_id: i64, amount_cents: i64) -> GatewayEvent {
    GatewayEvent {
        provider: PaymentProvider::Stripe,
        event_id: event_id.to_string(),
        event_type: "checkout.session.completed".into(),
        event: PaymentEvent::OrderPaid {
            order_id,
            payment_reference: "pi_test_1".into(),
            amount_cents: Some(amount_cents),
        },
    }
}

#[tokio::test]
async fn test_paid_digital_order_completes_and_issues_downloads() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, total) = place_digital_order(&store).await;

    let outcome = store.reconciliation().process(paid("evt_1", order_id, total)).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Applied);
    let order = store.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.payment_reference.as_deref(), Some("pi_test_1"));
    assert!(order.paid_at.is_some());

    let downloads = store.downloads.all();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].max_downloads, 3);
    assert_eq!(downloads[0].email, "reader@example.com");

    let sent = store.mailer.sent.lock();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].text.contains(&downloads[0].token));
}

#[tokio::test]
async fn test_redelivered_event_is_a_duplicate() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, total) = place_digital_order(&store).await;
    let reconciliation = store.reconciliation();

    reconciliation.process(paid("evt_1", order_id, total)).await.unwrap();
    let replay = reconciliation.process(paid("evt_1", order_id, total)).await.unwrap();

    assert_eq!(replay, ReconcileOutcome::Duplicate);
    assert_eq!(store.downloads.all().len(), 1);
    assert_eq!(store.mailer.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_second_payment_event_does_not_pay_twice() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, total) = place_digital_order(&store).await;
    let reconciliation = store.reconciliation();

    reconciliation.process(paid("evt_1", order_id, total)).await.unwrap();
    let again = reconciliation.process(paid("evt_2", order_id, total)).await.unwrap();

    assert_eq!(again, ReconcileOutcome::AlreadyApplied);
    assert_eq!(store.downloads.all().len(), 1);
}

#[tokio::test]
async fn test_amount_mismatch_leaves_order_pending() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, total) = place_digital_order(&store).await;

    let outcome = store
        .reconciliation()
        .process(paid("evt_1", order_id, total - 1))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::AmountMismatch);
    assert_eq!(store.orders.get(order_id).unwrap().status, OrderStatus::Pending);
    assert!(store.downloads.all().is_empty());
}

#[tokio::test]
async fn test_payment_for_unknown_order_is_unmatched() {
    let store = Store::new(vec![], vec![]);

    let outcome = store.reconciliation().process(paid("evt_9", 12345, 100)).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unmatched);
}

#[tokio::test]
async fn test_failed_grant_insert_leaves_order_payable_on_retry() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, total) = place_digital_order(&store).await;
    let reconciliation = store.reconciliation();
    store.downloads.fail_next_insert();

    let first = reconciliation.process(paid("evt_1", order_id, total)).await;
    assert!(first.is_err());
    assert_eq!(store.orders.get(order_id).unwrap().status, OrderStatus::Pending);
    assert!(store.downloads.all().is_empty());
    assert!(store.mailer.sent.lock().is_empty());

    // the provider redelivers the same event
    let retry = reconciliation.process(paid("evt_1", order_id, total)).await.unwrap();

    assert_eq!(retry, ReconcileOutcome::Applied);
    assert_eq!(store.orders.get(order_id).unwrap().status, OrderStatus::Completed);
    assert_eq!(store.downloads.all().len(), 1);
    assert_eq!(store.mailer.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_store_error_is_not_double_prefixed() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, total) = place_digital_order(&store).await;
    store.downloads.fail_next_insert();

    let err = store
        .reconciliation()
        .process(paid("evt_1", order_id, total))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Internal error: connection reset while inserting grants"
    );
}

fn refunded(event_id: &str, reference: &str) -> GatewayEvent {
    GatewayEvent {
        provider: PaymentProvider::Stripe,
        event_id: event_id.to_string(),
        event_type: "charge.refunded".into(),
        event: PaymentEvent::OrderRefunded {
            payment_reference: reference.to_string(),
        },
    }
}

#[tokio::test]
async fn test_gateway_refund_moves_paid_order_to_refunded() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, total) = place_digital_order(&store).await;
    let reconciliation = store.reconciliation();
    reconciliation.process(paid("evt_1", order_id, total)).await.unwrap();

    let outcome = reconciliation.process(refunded("evt_2", "pi_test_1")).await.unwrap();
    let again = reconciliation.process(refunded("evt_3", "pi_test_1")).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Applied);
    assert_eq!(again, ReconcileOutcome::AlreadyApplied);
    let order = store.orders.get(order_id).unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    assert!(order.refunded_at.is_some());
}

#[tokio::test]
async fn test_refund_of_unpaid_order_is_ignored() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1900)], vec![]);
    let (order_id, _) = place_digital_order(&store).await;
    let reference = store.orders.get(order_id).unwrap().payment_reference.unwrap();

    let outcome = store
        .reconciliation()
        .process(refunded("evt_1", &reference))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert_eq!(store.orders.get(order_id).unwrap().status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_refund_for_unknown_payment_is_unmatched() {
    let store = Store::new(vec![], vec![]);

    let outcome = store
        .reconciliation()
        .process(refunded("evt_1", "pi_missing"))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unmatched);
}
