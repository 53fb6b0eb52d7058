//! Reconciliation Service
//!
//! Applies verified payment webhooks to orders and subscriptions. Every
//! delivery is recorded by provider event id first, so a redelivered event
//! is a no-op; a failed apply forgets the id again so the provider's retry
//! gets processed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::money::format_amount;
use crate::domain::{
    paid_status_for, ChargeStatus, CustomerDownload, GatewayEvent, Order,
    OrderItem, OrderRepository, OrderStatus, PaymentEvent, PaymentProvider, ProductKind,
    ReconcileOutcome, Subscription, SubscriptionPayment, SubscriptionRepository,
    SubscriptionStatus, Transition, WebhookEventRepository,
};
use crate::infrastructure::email::{EmailMessage, Mailer};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Reconciliation service trait
#[async_trait]
pub trait ReconciliationService: Send + Sync {
    /// De-duplicate and apply one webhook delivery
    async fn process(&self, event: GatewayEvent) -> Result<ReconcileOutcome, ReconcileError>;

    /// Apply an event without de-duplication (PayPal return capture)
    async fn apply(&self, provider: PaymentProvider, event: &PaymentEvent) -> Result<ReconcileOutcome, ReconcileError>;
}

/// Reconciliation errors
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] AppError),
}

/// How download grants and confirmation mail are issued
#[derive(Debug, Clone)]
pub struct FulfilmentSettings {
    pub store_name: String,
    pub public_base_url: String,
    pub max_downloads: i32,
    pub download_valid_for: Duration,
}

/// ReconciliationService implementation
pub struct ReconciliationServiceImpl<O, S, W>
where
    O: OrderRepository,
    S: SubscriptionRepository,
    W: WebhookEventRepository,
{
    order_repo: Arc<O>,
    subscription_repo: Arc<S>,
    webhook_repo: Arc<W>,
    mailer: Arc<dyn Mailer>,
    id_generator: Arc<SnowflakeGenerator>,
    fulfilment: FulfilmentSettings,
}

impl<O, S, W> ReconciliationServiceImpl<O, S, W>
where
    O: OrderRepository,
    S: SubscriptionRepository,
    W: WebhookEventRepository,
{
    pub fn new(
        order_repo: Arc<O>,
        subscription_repo: Arc<S>,
        webhook_repo: Arc<W>,
        mailer: Arc<dyn Mailer>,
        id_generator: Arc<SnowflakeGenerator>,
        fulfilment: FulfilmentSettings,
    ) -> Self {
        Self {
            order_repo,
            subscription_repo,
            webhook_repo,
            mailer,
            id_generator,
            fulfilment,
        }
    }

    async fn order_paid(
        &self,
        provider: PaymentProvider,
        order_id: i64,
        reference: &str,
        amount_cents: Option<i64>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(order) = self.order_repo.find_by_id(order_id).await? else {
            tracing::warn!(order_id, "Payment for unknown order");
            return Ok(ReconcileOutcome::Unmatched);
        };

        if order.status != OrderStatus::Pending {
            tracing::debug!(order_id, status = %order.status, "Order already past payment");
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        if let Some(paid) = amount_cents {
            if paid != order.total_cents {
                tracing::error!(
                    order_id,
                    paid_cents = paid,
                    total_cents = order.total_cents,
                    "Paid amount does not match order total"
                );
                return Ok(ReconcileOutcome::AmountMismatch);
            }
        }

        let items = self.order_repo.items(order_id).await?;
        let target = paid_status_for(&items);
        if order.status.transition(target).is_err() {
            return Ok(ReconcileOutcome::Ignored);
        }

        // Conditional on the row still being pending: only one delivery wins,
        // and its grants commit together with the status.
        let downloads = self.download_grants(&order, &items);
        if !self
            .order_repo
            .mark_paid(order_id, provider, reference, target, &downloads)
            .await?
        {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        tracing::info!(order_id, status = %target, %provider, grants = downloads.len(), "Order paid");

        self.send_confirmation(&order, &downloads).await;

        Ok(ReconcileOutcome::Applied)
    }

    fn download_grants(&self, order: &Order, items: &[OrderItem]) -> Vec<CustomerDownload> {
        items
            .iter()
            .filter(|item| item.kind == ProductKind::Digital)
            .map(|item| {
                CustomerDownload::new(
                    self.id_generator.generate(),
                    order.id,
                    item.product_id,
                    &order.email,
                    self.fulfilment.max_downloads,
                    self.fulfilment.download_valid_for,
                )
            })
            .collect()
    }

    async fn send_confirmation(&self, order: &Order, downloads: &[CustomerDownload]) {
        let base = self.fulfilment.public_base_url.trim_end_matches('/');
        let mut text = format!(
            "Thank you for your order {}.\n\nTotal paid: {} {}\n",
            order.order_number,
            format_amount(order.total_cents),
            order.currency
        );
        if !downloads.is_empty() {
            text.push_str("\nYour downloads:\n");
            for download in downloads {
                text.push_str(&format!("{}/api/downloads/{}\n", base, download.token));
            }
            text.push_str(&format!(
                "\nEach link works {} times until {}.\n",
                self.fulfilment.max_downloads,
                downloads[0].expires_at.format("%Y-%m-%d %H:%M UTC")
            ));
        }

        let message = EmailMessage {
            to: order.email.clone(),
            subject: format!("{} order {}", self.fulfilment.store_name, order.order_number),
            text,
        };
        if let Err(e) = self.mailer.send(&message).await {
            tracing::error!(order_id = order.id, "Failed to send order confirmation: {}", e);
        }
    }

    async fn order_refunded(&self, reference: &str) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(order) = self.order_repo.find_by_payment_reference(reference).await? else {
            tracing::warn!(reference, "Refund for unknown payment");
            return Ok(ReconcileOutcome::Unmatched);
        };

        match order.status.transition(OrderStatus::Refunded) {
            Ok(Transition::Unchanged) => Ok(ReconcileOutcome::AlreadyApplied),
            Ok(Transition::Applied) => {
                if self
                    .order_repo
                    .update_status(order.id, order.status, OrderStatus::Refunded, None)
                    .await?
                {
                    tracing::info!(order_id = order.id, "Order refunded at gateway");
                    Ok(ReconcileOutcome::Applied)
                } else {
                    Ok(ReconcileOutcome::AlreadyApplied)
                }
            }
            Err(e) => {
                tracing::warn!(order_id = order.id, "Ignoring refund: {}", e);
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn subscription_activated(
        &self,
        provider: PaymentProvider,
        gateway_subscription_id: &str,
        user_id: i64,
        product_id: i64,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if self
            .subscription_repo
            .find_by_gateway_id(gateway_subscription_id)
            .await?
            .is_some()
        {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        let now = Utc::now();
        let subscription = Subscription {
            id: self.id_generator.generate(),
            user_id,
            product_id,
            provider,
            gateway_subscription_id: gateway_subscription_id.to_string(),
            status: SubscriptionStatus::Active,
            current_period_end,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        match self.subscription_repo.create(&subscription).await {
            Ok(created) => {
                tracing::info!(subscription_id = created.id, user_id, product_id, "Subscription activated");
                Ok(ReconcileOutcome::Applied)
            }
            Err(AppError::Conflict(_)) => Ok(ReconcileOutcome::AlreadyApplied),
            // user or product row does not exist
            Err(AppError::NotFound(_)) => Ok(ReconcileOutcome::Unmatched),
            Err(e) => Err(e.into()),
        }
    }

    async fn subscription_paid(
        &self,
        gateway_subscription_id: &str,
        gateway_payment_id: &str,
        amount_cents: i64,
        currency: &str,
        current_period_end: Option<DateTime<Utc>>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(subscription) = self
            .subscription_repo
            .find_by_gateway_id(gateway_subscription_id)
            .await?
        else {
            return Ok(ReconcileOutcome::Unmatched);
        };

        let payment = SubscriptionPayment {
            id: self.id_generator.generate(),
            subscription_id: subscription.id,
            gateway_payment_id: gateway_payment_id.to_string(),
            amount_cents,
            currency: currency.to_string(),
            status: ChargeStatus::Succeeded,
            created_at: Utc::now(),
        };
        if !self
            .subscription_repo
            .apply_payment(&payment, current_period_end)
            .await?
        {
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        if subscription.status == SubscriptionStatus::PastDue {
            tracing::info!(subscription_id = subscription.id, "Subscription recovered");
        }

        Ok(ReconcileOutcome::Applied)
    }

    async fn move_subscription(
        &self,
        gateway_subscription_id: &str,
        target: SubscriptionStatus,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(subscription) = self
            .subscription_repo
            .find_by_gateway_id(gateway_subscription_id)
            .await?
        else {
            return Ok(ReconcileOutcome::Unmatched);
        };

        match subscription.status.transition(target) {
            Ok(Transition::Unchanged) => Ok(ReconcileOutcome::AlreadyApplied),
            Ok(Transition::Applied) => {
                if self
                    .subscription_repo
                    .update_status(subscription.id, subscription.status, target)
                    .await?
                {
                    tracing::info!(
                        subscription_id = subscription.id,
                        from = %subscription.status,
                        to = %target,
                        "Subscription status changed"
                    );
                    Ok(ReconcileOutcome::Applied)
                } else {
                    Ok(ReconcileOutcome::AlreadyApplied)
                }
            }
            Err(e) => {
                // e.g. a late payment failure for a subscription already cancelled
                tracing::debug!(subscription_id = subscription.id, "Ignoring event: {}", e);
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }
}

#[async_trait]
impl<O, S, W> ReconciliationService for ReconciliationServiceImpl<O, S, W>
where
    O: OrderRepository + 'static,
    S: SubscriptionRepository + 'static,
    W: WebhookEventRepository + 'static,
{
    #[tracing::instrument(skip(self, event), fields(provider = %event.provider, event_id = %event.event_id, event_type = %event.event_type))]
    async fn process(&self, event: GatewayEvent) -> Result<ReconcileOutcome, ReconcileError> {
        let first_delivery = self
            .webhook_repo
            .record(event.provider, &event.event_id, &event.event_type)
            .await?;
        if !first_delivery {
            tracing::debug!("Duplicate webhook delivery");
            metrics::record_webhook_event(event.provider.as_str(), ReconcileOutcome::Duplicate.as_str());
            return Ok(ReconcileOutcome::Duplicate);
        }

        match self.apply(event.provider, &event.event).await {
            Ok(outcome) => {
                metrics::record_webhook_event(event.provider.as_str(), outcome.as_str());
                tracing::info!(kind = event.event.kind(), outcome = outcome.as_str(), "Webhook processed");
                Ok(outcome)
            }
            Err(e) => {
                metrics::record_webhook_event(event.provider.as_str(), "error");
                if let Err(forget_err) = self.webhook_repo.forget(event.provider, &event.event_id).await {
                    tracing::error!("Failed to forget webhook event after error: {}", forget_err);
                }
                Err(e)
            }
        }
    }

    async fn apply(&self, provider: PaymentProvider, event: &PaymentEvent) -> Result<ReconcileOutcome, ReconcileError> {
        match event {
            PaymentEvent::OrderPaid {
                order_id,
                payment_reference,
                amount_cents,
            } => {
                self.order_paid(provider, *order_id, payment_reference, *amount_cents)
                    .await
            }
            PaymentEvent::OrderRefunded { payment_reference } => {
                self.order_refunded(payment_reference).await
            }
            PaymentEvent::SubscriptionActivated {
                gateway_subscription_id,
                user_id,
                product_id,
                current_period_end,
            } => {
                self.subscription_activated(
                    provider,
                    gateway_subscription_id,
                    *user_id,
                    *product_id,
                    *current_period_end,
                )
                .await
            }
            PaymentEvent::SubscriptionPaymentSucceeded {
                gateway_subscription_id,
                gateway_payment_id,
                amount_cents,
                currency,
                current_period_end,
            } => {
                self.subscription_paid(
                    gateway_subscription_id,
                    gateway_payment_id,
                    *amount_cents,
                    currency,
                    *current_period_end,
                )
                .await
            }
            PaymentEvent::SubscriptionPaymentFailed {
                gateway_subscription_id,
            } => {
                self.move_subscription(gateway_subscription_id, SubscriptionStatus::PastDue)
                    .await
            }
            PaymentEvent::SubscriptionCancelled {
                gateway_subscription_id,
            } => {
                self.move_subscription(gateway_subscription_id, SubscriptionStatus::Cancelled)
                    .await
            }
            PaymentEvent::SubscriptionExpired {
                gateway_subscription_id,
            } => {
                self.move_subscription(gateway_subscription_id, SubscriptionStatus::Expired)
                    .await
            }
            PaymentEvent::Ignored => Ok(ReconcileOutcome::Ignored),
        }
    }
}
