//! Service flows over in-memory repositories.

mod checkout_tests;
mod download_tests;
mod maintenance_tests;
mod reconciliation_tests;
mod subscription_tests;

use std::sync::Arc;

use chrono::{Duration, Utc};
use storefront::application::services::{
    CartServiceImpl, CheckoutServiceImpl, CheckoutUrls, DownloadServiceImpl, FulfilmentSettings,
    MaintenanceService, ReconciliationServiceImpl, SubscriptionServiceImpl,
};
use storefront::infrastructure::cache::CredentialCache;
use storefront::domain::{PaymentProvider, PricingRules, Subscription, SubscriptionStatus};
use storefront::shared::snowflake::SnowflakeGenerator;

use crate::common::fakes::{
    fake_gateways, FakeGateway, InMemoryCarts, InMemoryDownloads, InMemoryOrders,
    InMemoryProducts, InMemorySubscriptions, InMemoryUsers, InMemoryWebhookEvents,
    RecordingMailer,
};

pub const RULES: PricingRules = PricingRules {
    tax_rate_bps: 0,
    flat_shipping_cents: 500,
    free_shipping_threshold_cents: 0,
};

/// Everything a checkout-to-fulfilment flow touches.
pub struct Store {
    pub products: Arc<InMemoryProducts>,
    pub carts: Arc<InMemoryCarts>,
    pub orders: Arc<InMemoryOrders>,
    pub subscriptions: Arc<InMemorySubscriptions>,
    pub downloads: Arc<InMemoryDownloads>,
    pub webhooks: Arc<InMemoryWebhookEvents>,
    pub users: Arc<InMemoryUsers>,
    pub mailer: Arc<RecordingMailer>,
    pub stripe: Arc<FakeGateway>,
    pub ids: Arc<SnowflakeGenerator>,
    gateways: storefront::infrastructure::payments::PaymentGateways,
}

impl Store {
    pub fn new(products: Vec<storefront::domain::Product>, subscriptions: Vec<Subscription>) -> Self {
        let products = Arc::new(InMemoryProducts::with(products));
        let downloads = Arc::new(InMemoryDownloads::default());
        let (gateways, stripe) = fake_gateways();
        Self {
            orders: Arc::new(InMemoryOrders::new(products.clone(), downloads.clone())),
            products,
            carts: Arc::new(InMemoryCarts::default()),
            subscriptions: Arc::new(InMemorySubscriptions::with(subscriptions)),
            downloads,
            webhooks: Arc::new(InMemoryWebhookEvents::default()),
            users: Arc::new(InMemoryUsers::default()),
            mailer: Arc::new(RecordingMailer::default()),
            stripe,
            ids: Arc::new(SnowflakeGenerator::new(1, 1_704_067_200_000)),
            gateways,
        }
    }

    pub fn carts(&self) -> CartServiceImpl<InMemoryCarts, InMemoryProducts, InMemorySubscriptions> {
        CartServiceImpl::new(
            self.carts.clone(),
            self.products.clone(),
            self.subscriptions.clone(),
            self.ids.clone(),
            RULES,
            "USD",
        )
    }

    pub fn checkout(
        &self,
    ) -> CheckoutServiceImpl<InMemoryOrders, InMemoryCarts, InMemoryProducts, InMemorySubscriptions> {
        CheckoutServiceImpl::new(
            self.orders.clone(),
            self.carts.clone(),
            self.products.clone(),
            self.subscriptions.clone(),
            self.gateways.clone(),
            self.ids.clone(),
            RULES,
            "USD",
            CheckoutUrls {
                public_base_url: "https://shop.test".into(),
            },
        )
    }

    pub fn reconciliation(
        &self,
    ) -> ReconciliationServiceImpl<InMemoryOrders, InMemorySubscriptions, InMemoryWebhookEvents> {
        ReconciliationServiceImpl::new(
            self.orders.clone(),
            self.subscriptions.clone(),
            self.webhooks.clone(),
            self.mailer.clone(),
            self.ids.clone(),
            FulfilmentSettings {
                store_name: "Test Store".into(),
                public_base_url: "https://shop.test".into(),
                max_downloads: 3,
                download_valid_for: Duration::hours(72),
            },
        )
    }

    pub fn subscription_service(
        &self,
    ) -> SubscriptionServiceImpl<InMemorySubscriptions, InMemoryProducts, InMemoryUsers> {
        SubscriptionServiceImpl::new(
            self.subscriptions.clone(),
            self.products.clone(),
            self.users.clone(),
            self.gateways.clone(),
            "https://shop.test",
        )
    }

    pub fn maintenance(&self, credential_cache: Arc<CredentialCache>) -> MaintenanceService {
        MaintenanceService::new(
            Arc::new(self.subscription_service()),
            Arc::new(DownloadServiceImpl::new(
                self.downloads.clone(),
                self.products.clone(),
                Duration::hours(72),
                "https://shop.test",
            )),
            credential_cache,
            Duration::days(3),
        )
    }
}

/// An active membership for `user_id`.
pub fn membership(user_id: i64) -> Subscription {
    subscription(user_id, SubscriptionStatus::Active, Duration::days(30))
}

/// A subscription for `user_id` in `status` whose period ends `period_left` from now.
pub fn subscription(user_id: i64, status: SubscriptionStatus, period_left: Duration) -> Subscription {
    let now = Utc::now();
    Subscription {
        id: 900 + user_id,
        user_id,
        product_id: 99,
        provider: PaymentProvider::Stripe,
        gateway_subscription_id: format!("sub_member_{}", user_id),
        status,
        current_period_end: Some(now + period_left),
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    }
}
