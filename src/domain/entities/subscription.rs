//! Subscription entities and repository trait.
//!
//! Maps to the `subscriptions` and `subscription_payments` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{PaymentProvider, SubscriptionStatus};
use crate::shared::error::AppError;

/// A recurring-billing record tied to a gateway subscription object.
///
/// Maps to the `subscriptions` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - product_id: BIGINT NOT NULL REFERENCES products(id)
/// - provider: VARCHAR(20) NOT NULL
/// - gateway_subscription_id: VARCHAR(255) NOT NULL UNIQUE
/// - status: VARCHAR(20) NOT NULL
/// - current_period_end: TIMESTAMPTZ NULL
/// - cancelled_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub provider: PaymentProvider,
    pub gateway_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether this subscription currently grants membership.
    pub fn grants_membership(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }
}

/// Outcome of a recurring charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Succeeded,
    Failed,
}

impl ChargeStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "succeeded" => Self::Succeeded,
            _ => Self::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// One recurring charge. `gateway_payment_id` is unique, which makes
/// recording a charge idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPayment {
    pub id: i64,
    pub subscription_id: i64,
    pub gateway_payment_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: ChargeStatus,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Subscription data access operations.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Subscription>, AppError>;

    async fn find_by_gateway_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, AppError>;

    /// Subscriptions of a user, newest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Subscription>, AppError>;

    /// All subscriptions, optionally filtered by status, newest first.
    async fn list(&self, status: Option<SubscriptionStatus>) -> Result<Vec<Subscription>, AppError>;

    /// Insert a subscription.
    ///
    /// Fails with `Conflict` if the gateway subscription id is already stored.
    async fn create(&self, subscription: &Subscription) -> Result<Subscription, AppError>;

    /// Conditionally move a subscription from `from` to `to`.
    ///
    /// Stamps `cancelled_at` when moving to `Cancelled`; returns false if the
    /// row was no longer in `from`.
    async fn update_status(
        &self,
        id: i64,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, AppError>;

    /// Whether the user owns at least one active subscription.
    async fn has_active(&self, user_id: i64) -> Result<bool, AppError>;

    /// Record a successful charge in one transaction with its effects: the
    /// paid-through date advances to `period_end` and a past-due
    /// subscription returns to active.
    ///
    /// Returns false, writing nothing, when the gateway payment id was
    /// already recorded.
    async fn apply_payment(
        &self,
        payment: &SubscriptionPayment,
        period_end: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError>;

    /// Charges of a subscription, newest first.
    async fn payments(&self, subscription_id: i64) -> Result<Vec<SubscriptionPayment>, AppError>;

    /// Past-due subscriptions whose period ended before `cutoff`.
    async fn find_lapsed(&self, cutoff: DateTime<Utc>) -> Result<Vec<Subscription>, AppError>;
}
