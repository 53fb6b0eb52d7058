//! In-memory repositories and gateway doubles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use storefront::domain::{
    CartItem, CartOwner, CartRepository, CustomerDownload, DownloadRepository, GatewayEvent,
    Order, OrderItem, OrderRepository, OrderStatus, PaymentProvider, Product, ProductKind,
    ProductRepository, ShoppingCart, Subscription, SubscriptionPayment, SubscriptionRepository,
    SubscriptionStatus, User, UserRepository, WebhookEventRepository,
};
use storefront::infrastructure::email::{EmailMessage, MailError, Mailer};
use storefront::infrastructure::payments::{
    CheckoutSession, GatewayError, OrderCheckout, PaymentGateway, PaymentGateways,
    SubscriptionCheckout,
};
use storefront::shared::error::AppError;

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryProducts {
    products: Mutex<HashMap<i64, Product>>,
}

impl InMemoryProducts {
    pub fn with(products: Vec<Product>) -> Self {
        Self {
            products: Mutex::new(products.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    pub fn stock(&self, id: i64) -> Option<i32> {
        self.products.lock().get(&id).and_then(|p| p.stock_quantity)
    }
}

#[async_trait]
impl ProductRepository for InMemoryProducts {
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, AppError> {
        Ok(self.products.lock().get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Product>, AppError> {
        Ok(self.products.lock().values().find(|p| p.slug == slug).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>, AppError> {
        let products = self.products.lock();
        Ok(ids.iter().filter_map(|id| products.get(id).cloned()).collect())
    }

    async fn list(&self, active_only: bool, kind: Option<ProductKind>) -> Result<Vec<Product>, AppError> {
        let mut list: Vec<Product> = self
            .products
            .lock()
            .values()
            .filter(|p| !active_only || p.is_active)
            .filter(|p| kind.map_or(true, |k| p.kind == k))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn create(&self, product: &Product) -> Result<Product, AppError> {
        self.products.lock().insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn update(&self, product: &Product) -> Result<Product, AppError> {
        self.products.lock().insert(product.id, product.clone());
        Ok(product.clone())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<(), AppError> {
        if let Some(product) = self.products.lock().get_mut(&id) {
            product.is_active = active;
        }
        Ok(())
    }

    async fn adjust_stock(&self, id: i64, delta: i32) -> Result<i32, AppError> {
        let mut products = self.products.lock();
        let product = products
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Product not found".into()))?;
        let current = product
            .stock_quantity
            .ok_or_else(|| AppError::BadRequest("Stock is not tracked".into()))?;
        let next = current + delta;
        if next < 0 {
            return Err(AppError::Conflict("Stock cannot go negative".into()));
        }
        product.stock_quantity = Some(next);
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Carts
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryCarts {
    carts: Mutex<Vec<ShoppingCart>>,
    items: Mutex<Vec<CartItem>>,
}

impl InMemoryCarts {
    pub fn line_count(&self) -> usize {
        self.items.lock().len()
    }
}

#[async_trait]
impl CartRepository for InMemoryCarts {
    async fn find_by_owner(&self, owner: &CartOwner) -> Result<Option<ShoppingCart>, AppError> {
        Ok(self
            .carts
            .lock()
            .iter()
            .find(|cart| match owner {
                CartOwner::User(id) => cart.user_id == Some(*id),
                CartOwner::Guest(token) => cart.session_token.as_deref() == Some(token.as_str()),
            })
            .cloned())
    }

    async fn create(&self, cart: &ShoppingCart) -> Result<ShoppingCart, AppError> {
        self.carts.lock().push(cart.clone());
        Ok(cart.clone())
    }

    async fn items(&self, cart_id: i64) -> Result<Vec<CartItem>, AppError> {
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn upsert_item(&self, item: &CartItem) -> Result<CartItem, AppError> {
        let mut items = self.items.lock();
        match items
            .iter_mut()
            .find(|i| i.cart_id == item.cart_id && i.product_id == item.product_id)
        {
            Some(existing) => {
                existing.quantity = item.quantity;
                Ok(existing.clone())
            }
            None => {
                items.push(item.clone());
                Ok(item.clone())
            }
        }
    }

    async fn remove_item(&self, cart_id: i64, product_id: i64) -> Result<bool, AppError> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|i| !(i.cart_id == cart_id && i.product_id == product_id));
        Ok(items.len() != before)
    }

    async fn clear(&self, cart_id: i64) -> Result<(), AppError> {
        self.items.lock().retain(|i| i.cart_id != cart_id);
        Ok(())
    }

    async fn delete(&self, cart_id: i64) -> Result<(), AppError> {
        self.clear(cart_id).await?;
        self.carts.lock().retain(|c| c.id != cart_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<HashMap<i64, User>>,
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        self.users.lock().insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AppError> {
        Ok(self.users.lock().values().any(|u| u.email == email))
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Orders share the product store so placement reserves stock, and the
/// download store so payment issues grants.
pub struct InMemoryOrders {
    products: Arc<InMemoryProducts>,
    downloads: Arc<InMemoryDownloads>,
    orders: Mutex<HashMap<i64, Order>>,
    items: Mutex<Vec<OrderItem>>,
}

impl InMemoryOrders {
    pub fn new(products: Arc<InMemoryProducts>, downloads: Arc<InMemoryDownloads>) -> Self {
        Self {
            products,
            downloads,
            orders: Mutex::new(HashMap::new()),
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, id: i64) -> Option<Order> {
        self.orders.lock().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.orders.lock().len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create_with_items(&self, order: &Order, items: &[OrderItem]) -> Result<Order, AppError> {
        {
            let mut products = self.products.products.lock();
            for item in items {
                let tracked = products.get(&item.product_id).and_then(|p| p.stock_quantity);
                if matches!(tracked, Some(stock) if stock < item.quantity) {
                    return Err(AppError::Conflict(format!(
                        "Not enough stock for {}",
                        item.product_name
                    )));
                }
            }
            for item in items {
                if let Some(stock) = products
                    .get_mut(&item.product_id)
                    .and_then(|p| p.stock_quantity.as_mut())
                {
                    *stock -= item.quantity;
                }
            }
        }

        self.orders.lock().insert(order.id, order.clone());
        self.items.lock().extend(items.iter().cloned());
        Ok(order.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Order>, AppError> {
        Ok(self.get(id))
    }

    async fn find_by_payment_reference(&self, reference: &str) -> Result<Option<Order>, AppError> {
        Ok(self
            .orders
            .lock()
            .values()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn items(&self, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .values()
            .filter(|o| o.is_owned_by(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list(&self, status: Option<OrderStatus>, limit: i64, offset: i64) -> Result<Vec<Order>, AppError> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .values()
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn set_payment_reference(
        &self,
        order_id: i64,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<(), AppError> {
        if let Some(order) = self.orders.lock().get_mut(&order_id) {
            order.payment_provider = Some(provider);
            order.payment_reference = Some(reference.to_string());
        }
        Ok(())
    }

    async fn mark_paid(
        &self,
        order_id: i64,
        provider: PaymentProvider,
        reference: &str,
        status: OrderStatus,
        downloads: &[CustomerDownload],
    ) -> Result<bool, AppError> {
        let mut orders = self.orders.lock();
        match orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Pending => {
                // a failed insert leaves the order untouched, as a rollback would
                self.downloads.insert(downloads)?;
                order.status = status;
                order.payment_provider = Some(provider);
                order.payment_reference = Some(reference.to_string());
                order.paid_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, AppError> {
        let mut orders = self.orders.lock();
        let Some(order) = orders.get_mut(&order_id).filter(|o| o.status == from) else {
            return Ok(false);
        };
        let now = Utc::now();
        order.status = to;
        match to {
            OrderStatus::Shipped => {
                order.shipped_at = Some(now);
                order.tracking_number = tracking_number.map(str::to_string);
            }
            OrderStatus::Delivered => order.delivered_at = Some(now),
            OrderStatus::Refunded => order.refunded_at = Some(now),
            _ => {}
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySubscriptions {
    subscriptions: Mutex<Vec<Subscription>>,
    payments: Mutex<Vec<SubscriptionPayment>>,
    /// Existing user and product ids; `None` accepts any reference.
    references: Mutex<Option<(HashSet<i64>, HashSet<i64>)>>,
}

impl InMemorySubscriptions {
    pub fn with(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions: Mutex::new(subscriptions),
            payments: Mutex::new(Vec::new()),
            references: Mutex::new(None),
        }
    }

    /// Reject rows that point at users or products outside these ids,
    /// like the foreign keys do.
    pub fn only_references(&self, users: &[i64], products: &[i64]) {
        *self.references.lock() = Some((
            users.iter().copied().collect(),
            products.iter().copied().collect(),
        ));
    }

    pub fn get(&self, id: i64) -> Option<Subscription> {
        self.subscriptions.lock().iter().find(|s| s.id == id).cloned()
    }

    pub fn by_gateway_id(&self, gateway_subscription_id: &str) -> Option<Subscription> {
        self.subscriptions
            .lock()
            .iter()
            .find(|s| s.gateway_subscription_id == gateway_subscription_id)
            .cloned()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.lock().len()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn find_by_id(&self, id: i64) -> Result<Option<Subscription>, AppError> {
        Ok(self.subscriptions.lock().iter().find(|s| s.id == id).cloned())
    }

    async fn find_by_gateway_id(&self, gateway_subscription_id: &str) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .subscriptions
            .lock()
            .iter()
            .find(|s| s.gateway_subscription_id == gateway_subscription_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list(&self, status: Option<SubscriptionStatus>) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned()
            .collect())
    }

    async fn create(&self, subscription: &Subscription) -> Result<Subscription, AppError> {
        if let Some((users, products)) = &*self.references.lock() {
            if !users.contains(&subscription.user_id) || !products.contains(&subscription.product_id) {
                return Err(AppError::NotFound("User or product".into()));
            }
        }
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions
            .iter()
            .any(|s| s.gateway_subscription_id == subscription.gateway_subscription_id)
        {
            return Err(AppError::Conflict("Subscription already recorded".into()));
        }
        subscriptions.push(subscription.clone());
        Ok(subscription.clone())
    }

    async fn update_status(
        &self,
        id: i64,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, AppError> {
        let mut subscriptions = self.subscriptions.lock();
        let Some(sub) = subscriptions.iter_mut().find(|s| s.id == id && s.status == from) else {
            return Ok(false);
        };
        sub.status = to;
        if to == SubscriptionStatus::Cancelled {
            sub.cancelled_at = Some(Utc::now());
        }
        Ok(true)
    }

    async fn has_active(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self
            .subscriptions
            .lock()
            .iter()
            .any(|s| s.user_id == user_id && s.status == SubscriptionStatus::Active))
    }

    async fn apply_payment(
        &self,
        payment: &SubscriptionPayment,
        period_end: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let mut payments = self.payments.lock();
        if payments
            .iter()
            .any(|p| p.gateway_payment_id == payment.gateway_payment_id)
        {
            return Ok(false);
        }
        payments.push(payment.clone());

        let mut subscriptions = self.subscriptions.lock();
        if let Some(sub) = subscriptions.iter_mut().find(|s| s.id == payment.subscription_id) {
            if let Some(end) = period_end {
                sub.current_period_end = Some(sub.current_period_end.map_or(end, |cur| cur.max(end)));
            }
            if sub.status == SubscriptionStatus::PastDue {
                sub.status = SubscriptionStatus::Active;
            }
        }
        Ok(true)
    }

    async fn payments(&self, subscription_id: i64) -> Result<Vec<SubscriptionPayment>, AppError> {
        Ok(self
            .payments
            .lock()
            .iter()
            .filter(|p| p.subscription_id == subscription_id)
            .cloned()
            .collect())
    }

    async fn find_lapsed(&self, cutoff: DateTime<Utc>) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.status == SubscriptionStatus::PastDue)
            .filter(|s| s.current_period_end.is_some_and(|end| end < cutoff))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Downloads and webhook log
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryDownloads {
    downloads: Mutex<Vec<CustomerDownload>>,
    fail_next_insert: Mutex<bool>,
}

impl InMemoryDownloads {
    pub fn all(&self) -> Vec<CustomerDownload> {
        self.downloads.lock().clone()
    }

    /// Make the next grant insert fail like a dropped connection.
    pub fn fail_next_insert(&self) {
        *self.fail_next_insert.lock() = true;
    }

    pub fn insert(&self, downloads: &[CustomerDownload]) -> Result<(), AppError> {
        if std::mem::take(&mut *self.fail_next_insert.lock()) {
            return Err(AppError::Internal("connection reset while inserting grants".into()));
        }
        self.downloads.lock().extend(downloads.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl DownloadRepository for InMemoryDownloads {
    async fn find_by_token(&self, token: &str) -> Result<Option<CustomerDownload>, AppError> {
        Ok(self.downloads.lock().iter().find(|d| d.token == token).cloned())
    }

    async fn list_for_order(&self, order_id: i64) -> Result<Vec<CustomerDownload>, AppError> {
        Ok(self
            .downloads
            .lock()
            .iter()
            .filter(|d| d.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn redeem(&self, token: &str) -> Result<Option<CustomerDownload>, AppError> {
        let now = Utc::now();
        let mut downloads = self.downloads.lock();
        let Some(download) = downloads.iter_mut().find(|d| d.token == token) else {
            return Ok(None);
        };
        if download.expires_at <= now || download.download_count >= download.max_downloads {
            return Ok(None);
        }
        download.download_count += 1;
        download.last_downloaded_at = Some(now);
        Ok(Some(download.clone()))
    }

    async fn reset(&self, id: i64, expires_at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut downloads = self.downloads.lock();
        let Some(download) = downloads.iter_mut().find(|d| d.id == id) else {
            return Ok(false);
        };
        download.download_count = 0;
        download.expires_at = expires_at;
        Ok(true)
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut downloads = self.downloads.lock();
        let before = downloads.len();
        downloads.retain(|d| d.expires_at >= cutoff);
        Ok((before - downloads.len()) as u64)
    }
}

#[derive(Default)]
pub struct InMemoryWebhookEvents {
    seen: Mutex<HashSet<(PaymentProvider, String)>>,
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEvents {
    async fn record(&self, provider: PaymentProvider, event_id: &str, _event_type: &str) -> Result<bool, AppError> {
        Ok(self.seen.lock().insert((provider, event_id.to_string())))
    }

    async fn forget(&self, provider: PaymentProvider, event_id: &str) -> Result<(), AppError> {
        self.seen.lock().remove(&(provider, event_id.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Gateways and mail
// ---------------------------------------------------------------------------

/// Gateway that hands out predictable checkout sessions.
pub struct FakeGateway {
    provider: PaymentProvider,
    pub checkouts: Mutex<Vec<OrderCheckout>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new(provider: PaymentProvider) -> Self {
        Self {
            provider,
            checkouts: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    async fn create_order_checkout(&self, checkout: &OrderCheckout) -> Result<CheckoutSession, GatewayError> {
        self.checkouts.lock().push(checkout.clone());
        Ok(CheckoutSession {
            reference: format!("{}_{}", self.provider.as_str(), checkout.order_id),
            redirect_url: format!("https://pay.test/{}", checkout.order_number),
        })
    }

    async fn create_subscription_checkout(
        &self,
        checkout: &SubscriptionCheckout,
    ) -> Result<CheckoutSession, GatewayError> {
        Ok(CheckoutSession {
            reference: format!("sub_{}_{}", checkout.user_id, checkout.product_id),
            redirect_url: "https://pay.test/subscribe".into(),
        })
    }

    async fn cancel_subscription(&self, gateway_subscription_id: &str) -> Result<(), GatewayError> {
        self.cancelled.lock().push(gateway_subscription_id.to_string());
        Ok(())
    }

    async fn verify_webhook(&self, _headers: &HeaderMap, _body: &[u8]) -> Result<(), GatewayError> {
        Ok(())
    }

    fn parse_webhook(&self, _body: &[u8]) -> Result<GatewayEvent, GatewayError> {
        Err(GatewayError::Unsupported(self.provider.as_str()))
    }
}

pub fn fake_gateways() -> (PaymentGateways, Arc<FakeGateway>) {
    let stripe = Arc::new(FakeGateway::new(PaymentProvider::Stripe));
    let gateways = PaymentGateways {
        stripe: stripe.clone(),
        paypal: Arc::new(FakeGateway::new(PaymentProvider::PayPal)),
    };
    (gateways, stripe)
}

/// Mailer that keeps every message.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
