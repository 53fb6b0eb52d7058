//! Subscription Service
//!
//! Starts gateway subscription checkouts, cancels subscriptions and answers
//! the membership question used by member pricing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::{
    PaymentProvider, ProductRepository, Subscription, SubscriptionPayment, SubscriptionRepository,
    SubscriptionStatus, Transition, UserRepository,
};
use crate::infrastructure::payments::{
    CheckoutSession, GatewayError, PaymentGateways, SubscriptionCheckout,
};

/// Subscription service trait
#[async_trait]
pub trait SubscriptionService: Send + Sync {
    /// Start a hosted subscription checkout for a subscription product
    async fn start_checkout(
        &self,
        user_id: i64,
        product_id: i64,
        provider: PaymentProvider,
    ) -> Result<CheckoutSession, SubscriptionError>;

    /// The user's subscriptions, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Subscription>, SubscriptionError>;

    /// Cancel one of the user's subscriptions at the gateway and locally
    async fn cancel(&self, user_id: i64, subscription_id: i64) -> Result<Subscription, SubscriptionError>;

    async fn admin_list(&self, status: Option<SubscriptionStatus>) -> Result<Vec<Subscription>, SubscriptionError>;

    /// Subscription with its charge history
    async fn admin_get(&self, subscription_id: i64) -> Result<SubscriptionDetailDto, SubscriptionError>;

    /// Whether the user currently holds an active subscription
    async fn is_member(&self, user_id: i64) -> Result<bool, SubscriptionError>;

    /// Expire past-due subscriptions whose period ended more than `grace` before `now`
    async fn expire_lapsed(&self, now: DateTime<Utc>, grace: Duration) -> Result<usize, SubscriptionError>;
}

/// Subscription with charges
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetailDto {
    pub subscription: Subscription,
    pub payments: Vec<SubscriptionPayment>,
}

/// Subscription service errors
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription not found")]
    NotFound,

    #[error("Product not found")]
    ProductNotFound,

    #[error("Product is not a subscription")]
    NotASubscription,

    #[error("Product is not offered through {0}")]
    ProviderNotOffered(PaymentProvider),

    #[error("You already have an active subscription to this product")]
    AlreadySubscribed,

    #[error("{0}")]
    InvalidTransition(#[from] crate::domain::InvalidTransition),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// SubscriptionService implementation
pub struct SubscriptionServiceImpl<S, P, U>
where
    S: SubscriptionRepository,
    P: ProductRepository,
    U: UserRepository,
{
    subscription_repo: Arc<S>,
    product_repo: Arc<P>,
    user_repo: Arc<U>,
    gateways: PaymentGateways,
    public_base_url: String,
}

impl<S, P, U> SubscriptionServiceImpl<S, P, U>
where
    S: SubscriptionRepository,
    P: ProductRepository,
    U: UserRepository,
{
    pub fn new(
        subscription_repo: Arc<S>,
        product_repo: Arc<P>,
        user_repo: Arc<U>,
        gateways: PaymentGateways,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            subscription_repo,
            product_repo,
            user_repo,
            gateways,
            public_base_url: public_base_url.into(),
        }
    }

    async fn load(&self, subscription_id: i64) -> Result<Subscription, SubscriptionError> {
        self.subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))?
            .ok_or(SubscriptionError::NotFound)
    }
}

#[async_trait]
impl<S, P, U> SubscriptionService for SubscriptionServiceImpl<S, P, U>
where
    S: SubscriptionRepository + 'static,
    P: ProductRepository + 'static,
    U: UserRepository + 'static,
{
    #[tracing::instrument(skip(self))]
    async fn start_checkout(
        &self,
        user_id: i64,
        product_id: i64,
        provider: PaymentProvider,
    ) -> Result<CheckoutSession, SubscriptionError> {
        let product = self
            .product_repo
            .find_by_id(product_id)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))?
            .filter(|p| p.is_active)
            .ok_or(SubscriptionError::ProductNotFound)?;
        if !product.is_subscription() {
            return Err(SubscriptionError::NotASubscription);
        }

        let offered = match provider {
            PaymentProvider::Stripe => product.stripe_price_id.is_some(),
            PaymentProvider::PayPal => product.paypal_plan_id.is_some(),
        };
        if !offered {
            return Err(SubscriptionError::ProviderNotOffered(provider));
        }

        let existing = self
            .subscription_repo
            .list_for_user(user_id)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))?;
        if existing
            .iter()
            .any(|s| s.product_id == product_id && !s.status.is_terminal())
        {
            return Err(SubscriptionError::AlreadySubscribed);
        }

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))?
            .ok_or_else(|| SubscriptionError::Internal(format!("user {} vanished", user_id)))?;

        let base = self.public_base_url.trim_end_matches('/');
        let checkout = SubscriptionCheckout {
            user_id,
            product_id,
            email: user.email,
            stripe_price_id: product.stripe_price_id,
            paypal_plan_id: product.paypal_plan_id,
            success_url: format!("{}/account/subscriptions?status=success", base),
            cancel_url: format!("{}/products/{}", base, product.slug),
        };

        let session = self
            .gateways
            .get(provider)
            .create_subscription_checkout(&checkout)
            .await?;

        tracing::info!(reference = %session.reference, "Subscription checkout started");
        Ok(session)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Subscription>, SubscriptionError> {
        self.subscription_repo
            .list_for_user(user_id)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))
    }

    #[tracing::instrument(skip(self))]
    async fn cancel(&self, user_id: i64, subscription_id: i64) -> Result<Subscription, SubscriptionError> {
        let subscription = self.load(subscription_id).await?;
        if subscription.user_id != user_id {
            return Err(SubscriptionError::NotFound);
        }

        if subscription.status.transition(SubscriptionStatus::Cancelled)? == Transition::Unchanged {
            return Ok(subscription);
        }

        self.gateways
            .get(subscription.provider)
            .cancel_subscription(&subscription.gateway_subscription_id)
            .await?;

        // The gateway's cancellation webhook may have won the race; either way
        // the row ends up cancelled.
        self.subscription_repo
            .update_status(subscription_id, subscription.status, SubscriptionStatus::Cancelled)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))?;

        tracing::info!(subscription_id, "Subscription cancelled by customer");
        self.load(subscription_id).await
    }

    async fn admin_list(&self, status: Option<SubscriptionStatus>) -> Result<Vec<Subscription>, SubscriptionError> {
        self.subscription_repo
            .list(status)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))
    }

    async fn admin_get(&self, subscription_id: i64) -> Result<SubscriptionDetailDto, SubscriptionError> {
        let subscription = self.load(subscription_id).await?;
        let payments = self
            .subscription_repo
            .payments(subscription_id)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))?;

        Ok(SubscriptionDetailDto {
            subscription,
            payments,
        })
    }

    async fn is_member(&self, user_id: i64) -> Result<bool, SubscriptionError> {
        self.subscription_repo
            .has_active(user_id)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))
    }

    #[tracing::instrument(skip(self))]
    async fn expire_lapsed(&self, now: DateTime<Utc>, grace: Duration) -> Result<usize, SubscriptionError> {
        let lapsed = self
            .subscription_repo
            .find_lapsed(now - grace)
            .await
            .map_err(|e| SubscriptionError::Internal(e.to_string()))?;

        let mut expired = 0;
        for subscription in lapsed {
            let moved = self
                .subscription_repo
                .update_status(subscription.id, SubscriptionStatus::PastDue, SubscriptionStatus::Expired)
                .await
                .map_err(|e| SubscriptionError::Internal(e.to_string()))?;
            if moved {
                tracing::info!(subscription_id = subscription.id, "Subscription expired after grace period");
                expired += 1;
            }
        }
        Ok(expired)
    }
}
