//! Cart pricing and order placement.

use pretty_assertions::assert_eq;
use storefront::application::services::{CartError, CartService, CheckoutError, CheckoutService, PlaceOrderDto};
use storefront::domain::{CartOwner, PaymentProvider, ProductKind, ShippingAddress};

use super::{membership, Store};
use crate::common::product;

fn guest(token: &str) -> CartOwner {
    CartOwner::Guest(token.to_string())
}

fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Ada Lovelace".into(),
        line1: "12 Analytical Row".into(),
        line2: None,
        city: "London".into(),
        region: "LDN".into(),
        postal_code: "N1 9GU".into(),
        country: "GB".into(),
        phone: None,
    }
}

fn order_request(shipping: Option<ShippingAddress>) -> PlaceOrderDto {
    PlaceOrderDto {
        email: "Buyer@Example.com".into(),
        shipping_address: shipping,
        provider: PaymentProvider::Stripe,
    }
}

#[tokio::test]
async fn test_members_pay_member_price() {
    let mut mug = product(1, ProductKind::Physical, 2000);
    mug.member_price_cents = Some(1500);
    let store = Store::new(vec![mug], vec![membership(7)]);
    let carts = store.carts();

    let member_view = carts.add_item(&CartOwner::User(7), 1, 2).await.unwrap();
    assert!(member_view.is_member);
    assert_eq!(member_view.items[0].effective_unit_price_cents, 1500);
    assert_eq!(member_view.totals.subtotal_cents, 3000);
    assert_eq!(member_view.totals.member_savings_cents, 1000);
    assert_eq!(member_view.totals.total_cents, 3500);

    let guest_view = carts.add_item(&guest("guest-a"), 1, 2).await.unwrap();
    assert!(!guest_view.is_member);
    assert_eq!(guest_view.items[0].effective_unit_price_cents, 2000);
    assert_eq!(guest_view.totals.member_savings_cents, 0);
    assert_eq!(guest_view.cart_token.as_deref(), Some("guest-a"));
}

#[tokio::test]
async fn test_cart_refuses_subscriptions_and_overselling() {
    let mut poster = product(1, ProductKind::Physical, 1000);
    poster.stock_quantity = Some(2);
    let plan = product(2, ProductKind::Subscription, 900);
    let store = Store::new(vec![poster, plan], vec![]);
    let carts = store.carts();
    let owner = guest("guest-b");

    let err = carts.add_item(&owner, 2, 1).await.unwrap_err();
    assert!(matches!(err, CartError::SubscriptionNotAllowed));

    carts.add_item(&owner, 1, 2).await.unwrap();
    let err = carts.add_item(&owner, 1, 1).await.unwrap_err();
    assert!(matches!(err, CartError::InsufficientStock { available: 2 }));
}

#[tokio::test]
async fn test_merge_moves_guest_lines_to_account() {
    let store = Store::new(vec![product(1, ProductKind::Digital, 1200)], vec![]);
    let carts = store.carts();

    carts.add_item(&guest("guest-c"), 1, 1).await.unwrap();
    let merged = carts.merge("guest-c", 42).await.unwrap();

    assert_eq!(merged.items.len(), 1);
    assert!(carts.view(&guest("guest-c")).await.unwrap().items.is_empty());
}

#[tokio::test]
async fn test_place_order_reserves_stock_and_clears_cart() {
    let mut lamp = product(1, ProductKind::Physical, 4000);
    lamp.stock_quantity = Some(3);
    let store = Store::new(vec![lamp], vec![]);
    let owner = guest("guest-d");
    store.carts().add_item(&owner, 1, 2).await.unwrap();

    let result = store
        .checkout()
        .place_order(&owner, order_request(Some(address())))
        .await
        .unwrap();

    assert_eq!(result.total_cents, 8500);
    assert_eq!(result.provider, PaymentProvider::Stripe);
    assert_eq!(store.products.stock(1), Some(1));
    assert_eq!(store.carts.line_count(), 0);

    let order_id: i64 = result.order_id.parse().unwrap();
    let order = store.orders.get(order_id).unwrap();
    assert_eq!(order.email, "buyer@example.com");
    assert_eq!(order.payment_reference.as_deref(), Some(format!("stripe_{}", order_id).as_str()));
    assert_eq!(store.stripe.checkouts.lock().len(), 1);
}

#[tokio::test]
async fn test_last_unit_goes_to_one_buyer() {
    let mut print = product(1, ProductKind::Physical, 2500);
    print.stock_quantity = Some(1);
    let store = Store::new(vec![print], vec![]);
    let carts = store.carts();
    let first = guest("guest-e");
    let second = guest("guest-f");
    carts.add_item(&first, 1, 1).await.unwrap();
    carts.add_item(&second, 1, 1).await.unwrap();

    let checkout = store.checkout();
    checkout
        .place_order(&first, order_request(Some(address())))
        .await
        .unwrap();
    let err = checkout
        .place_order(&second, order_request(Some(address())))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::InsufficientStock(_)));
    assert_eq!(store.products.stock(1), Some(0));
    assert_eq!(store.orders.count(), 1);
}

#[tokio::test]
async fn test_physical_items_need_an_address() {
    let store = Store::new(vec![product(1, ProductKind::Physical, 1500)], vec![]);
    let owner = guest("guest-g");
    store.carts().add_item(&owner, 1, 1).await.unwrap();

    let err = store
        .checkout()
        .place_order(&owner, order_request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::ShippingAddressRequired));
    assert_eq!(store.orders.count(), 0);
}

#[tokio::test]
async fn test_empty_cart_cannot_check_out() {
    let store = Store::new(vec![], vec![]);

    let err = store
        .checkout()
        .place_order(&guest("guest-h"), order_request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
}
