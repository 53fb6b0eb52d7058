//! Subscription lifecycle driven by gateway events and by customers.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use test_case::test_case;
use storefront::application::services::{ReconciliationService, SubscriptionError, SubscriptionService};
use storefront::domain::{GatewayEvent, PaymentEvent, PaymentProvider, ReconcileOutcome, SubscriptionStatus};

use super::{subscription, Store};

fn event(event_id: &str, event: PaymentEvent) -> GatewayEvent {
    GatewayEvent {
        provider: PaymentProvider::Stripe,
        event_id: event_id.to_string(),
        event_type: event.kind().to_string(),
        event,
    }
}

fn activated(user_id: i64, product_id: i64) -> PaymentEvent {
    PaymentEvent::SubscriptionActivated {
        gateway_subscription_id: "sub_new".into(),
        user_id,
        product_id,
        current_period_end: Some(Utc::now() + Duration::days(30)),
    }
}

fn charge(payment_id: &str, period_end: chrono::DateTime<Utc>) -> PaymentEvent {
    PaymentEvent::SubscriptionPaymentSucceeded {
        gateway_subscription_id: "sub_member_7".into(),
        gateway_payment_id: payment_id.to_string(),
        amount_cents: 900,
        currency: "USD".into(),
        current_period_end: Some(period_end),
    }
}

#[tokio::test]
async fn test_activation_creates_active_subscription_once() {
    let store = Store::new(vec![], vec![]);
    let reconciliation = store.reconciliation();

    let first = reconciliation.process(event("evt_1", activated(7, 99))).await.unwrap();
    let replay = reconciliation.process(event("evt_2", activated(7, 99))).await.unwrap();

    assert_eq!(first, ReconcileOutcome::Applied);
    assert_eq!(replay, ReconcileOutcome::AlreadyApplied);
    let created = store.subscriptions.by_gateway_id("sub_new").unwrap();
    assert_eq!(created.status, SubscriptionStatus::Active);
    assert_eq!(created.user_id, 7);
    assert_eq!(created.provider, PaymentProvider::Stripe);
}

#[test_case(8, 99 ; "unknown user")]
#[test_case(7, 42 ; "unknown product")]
#[tokio::test]
async fn test_activation_for_missing_references_is_unmatched(user_id: i64, product_id: i64) {
    let store = Store::new(vec![], vec![]);
    store.subscriptions.only_references(&[7], &[99]);

    let outcome = store
        .reconciliation()
        .process(event("evt_1", activated(user_id, product_id)))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unmatched);
    assert!(store.subscriptions.by_gateway_id("sub_new").is_none());
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    PaymentFailed,
    Cancelled,
    Expired,
}

impl Signal {
    fn event(self) -> PaymentEvent {
        let gateway_subscription_id = "sub_member_7".to_string();
        match self {
            Signal::PaymentFailed => PaymentEvent::SubscriptionPaymentFailed { gateway_subscription_id },
            Signal::Cancelled => PaymentEvent::SubscriptionCancelled { gateway_subscription_id },
            Signal::Expired => PaymentEvent::SubscriptionExpired { gateway_subscription_id },
        }
    }
}

#[test_case(SubscriptionStatus::Active, Signal::PaymentFailed, ReconcileOutcome::Applied, SubscriptionStatus::PastDue ; "failed charge makes active past due")]
#[test_case(SubscriptionStatus::PastDue, Signal::PaymentFailed, ReconcileOutcome::AlreadyApplied, SubscriptionStatus::PastDue ; "repeated failure")]
#[test_case(SubscriptionStatus::Cancelled, Signal::PaymentFailed, ReconcileOutcome::Ignored, SubscriptionStatus::Cancelled ; "late failure after cancel")]
#[test_case(SubscriptionStatus::Active, Signal::Cancelled, ReconcileOutcome::Applied, SubscriptionStatus::Cancelled ; "cancelled at gateway")]
#[test_case(SubscriptionStatus::PastDue, Signal::Expired, ReconcileOutcome::Applied, SubscriptionStatus::Expired ; "expired at gateway")]
#[test_case(SubscriptionStatus::Expired, Signal::Cancelled, ReconcileOutcome::Ignored, SubscriptionStatus::Expired ; "expired never reopens")]
#[tokio::test]
async fn test_status_events(
    start: SubscriptionStatus,
    signal: Signal,
    expected_outcome: ReconcileOutcome,
    expected_status: SubscriptionStatus,
) {
    let existing = subscription(7, start, Duration::days(10));
    let id = existing.id;
    let store = Store::new(vec![], vec![existing]);

    let outcome = store
        .reconciliation()
        .process(event("evt_1", signal.event()))
        .await
        .unwrap();

    assert_eq!(outcome, expected_outcome);
    assert_eq!(store.subscriptions.get(id).unwrap().status, expected_status);
}

#[tokio::test]
async fn test_successful_charge_recovers_past_due_subscription() {
    let existing = subscription(7, SubscriptionStatus::PastDue, Duration::days(-1));
    let id = existing.id;
    let store = Store::new(vec![], vec![existing]);
    let reconciliation = store.reconciliation();
    let period_end = Utc::now() + Duration::days(29);

    let outcome = reconciliation.process(event("evt_1", charge("in_1", period_end))).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Applied);
    let recovered = store.subscriptions.get(id).unwrap();
    assert_eq!(recovered.status, SubscriptionStatus::Active);
    assert_eq!(recovered.current_period_end, Some(period_end));
    assert_eq!(store.subscriptions.payment_count(), 1);
}

#[tokio::test]
async fn test_same_charge_under_new_event_is_recorded_once() {
    let store = Store::new(vec![], vec![subscription(7, SubscriptionStatus::Active, Duration::days(1))]);
    let reconciliation = store.reconciliation();
    let period_end = Utc::now() + Duration::days(31);

    reconciliation.process(event("evt_1", charge("in_1", period_end))).await.unwrap();
    let again = reconciliation.process(event("evt_2", charge("in_1", period_end))).await.unwrap();

    assert_eq!(again, ReconcileOutcome::AlreadyApplied);
    assert_eq!(store.subscriptions.payment_count(), 1);
}

#[tokio::test]
async fn test_charge_for_unknown_subscription_is_unmatched() {
    let store = Store::new(vec![], vec![]);

    let outcome = store
        .reconciliation()
        .process(event("evt_1", charge("in_1", Utc::now())))
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Unmatched);
    assert_eq!(store.subscriptions.payment_count(), 0);
}

#[tokio::test]
async fn test_customer_cancel_reaches_gateway_and_row() {
    let existing = subscription(7, SubscriptionStatus::Active, Duration::days(10));
    let id = existing.id;
    let store = Store::new(vec![], vec![existing]);

    let cancelled = store.subscription_service().cancel(7, id).await.unwrap();

    assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(*store.stripe.cancelled.lock(), vec!["sub_member_7".to_string()]);
}

#[tokio::test]
async fn test_cancel_of_cancelled_subscription_skips_gateway() {
    let existing = subscription(7, SubscriptionStatus::Cancelled, Duration::days(10));
    let id = existing.id;
    let store = Store::new(vec![], vec![existing]);

    let unchanged = store.subscription_service().cancel(7, id).await.unwrap();

    assert_eq!(unchanged.status, SubscriptionStatus::Cancelled);
    assert!(store.stripe.cancelled.lock().is_empty());
}

#[tokio::test]
async fn test_cancel_of_someone_elses_subscription_is_not_found() {
    let existing = subscription(7, SubscriptionStatus::Active, Duration::days(10));
    let id = existing.id;
    let store = Store::new(vec![], vec![existing]);

    let err = store.subscription_service().cancel(8, id).await.unwrap_err();

    assert!(matches!(err, SubscriptionError::NotFound));
    assert_eq!(store.subscriptions.get(id).unwrap().status, SubscriptionStatus::Active);
}

#[test_case(SubscriptionStatus::PastDue, -5, SubscriptionStatus::Expired ; "past due beyond grace")]
#[test_case(SubscriptionStatus::PastDue, -1, SubscriptionStatus::PastDue ; "past due within grace")]
#[test_case(SubscriptionStatus::Active, -30, SubscriptionStatus::Active ; "active rows are left to the gateway")]
#[tokio::test]
async fn test_expire_lapsed(start: SubscriptionStatus, period_left_days: i64, expected: SubscriptionStatus) {
    let existing = subscription(7, start, Duration::days(period_left_days));
    let id = existing.id;
    let store = Store::new(vec![], vec![existing]);

    store
        .subscription_service()
        .expire_lapsed(Utc::now(), Duration::days(3))
        .await
        .unwrap();

    assert_eq!(store.subscriptions.get(id).unwrap().status, expected);
}
