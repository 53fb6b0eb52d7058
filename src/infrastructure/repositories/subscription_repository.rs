//! Subscription Repository Implementation
//!
//! PostgreSQL implementation of the SubscriptionRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    ChargeStatus, PaymentProvider, Subscription, SubscriptionPayment, SubscriptionRepository,
    SubscriptionStatus,
};
use crate::shared::error::AppError;

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, product_id, provider, gateway_subscription_id, status,
    current_period_end, cancelled_at, created_at, updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    user_id: i64,
    product_id: i64,
    provider: String,
    gateway_subscription_id: String,
    status: String,
    current_period_end: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    fn into_subscription(self) -> Result<Subscription, AppError> {
        let provider = PaymentProvider::parse(&self.provider).ok_or_else(|| {
            AppError::Internal(format!("Unknown payment provider '{}'", self.provider))
        })?;

        Ok(Subscription {
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            provider,
            gateway_subscription_id: self.gateway_subscription_id,
            status: SubscriptionStatus::from_str(&self.status),
            current_period_end: self.current_period_end,
            cancelled_at: self.cancelled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: i64,
    subscription_id: i64,
    gateway_payment_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> SubscriptionPayment {
        SubscriptionPayment {
            id: self.id,
            subscription_id: self.subscription_id,
            gateway_payment_id: self.gateway_payment_id,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status: ChargeStatus::from_str(&self.status),
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL subscription repository implementation.
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn collect(rows: Vec<SubscriptionRow>) -> Result<Vec<Subscription>, AppError> {
        rows.into_iter().map(|r| r.into_subscription()).collect()
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Subscription>, AppError> {
        let query = format!("SELECT {} FROM subscriptions WHERE id = $1", SUBSCRIPTION_COLUMNS);
        sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|r| r.into_subscription())
            .transpose()
    }

    async fn find_by_gateway_id(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<Option<Subscription>, AppError> {
        let query = format!(
            "SELECT {} FROM subscriptions WHERE gateway_subscription_id = $1",
            SUBSCRIPTION_COLUMNS
        );
        sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(gateway_subscription_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|r| r.into_subscription())
            .transpose()
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Subscription>, AppError> {
        let query = format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC",
            SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Self::collect(rows)
    }

    async fn list(&self, status: Option<SubscriptionStatus>) -> Result<Vec<Subscription>, AppError> {
        let query = format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE ($1::VARCHAR IS NULL OR status = $1::VARCHAR)
            ORDER BY created_at DESC
            "#,
            SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;

        Self::collect(rows)
    }

    async fn create(&self, subscription: &Subscription) -> Result<Subscription, AppError> {
        let query = format!(
            r#"
            INSERT INTO subscriptions (
                id, user_id, product_id, provider, gateway_subscription_id, status,
                current_period_end, cancelled_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        );
        sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(subscription.id)
            .bind(subscription.user_id)
            .bind(subscription.product_id)
            .bind(subscription.provider.as_str())
            .bind(&subscription.gateway_subscription_id)
            .bind(subscription.status.as_str())
            .bind(subscription.current_period_end)
            .bind(subscription.cancelled_at)
            .bind(subscription.created_at)
            .bind(subscription.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict("Subscription already recorded".to_string())
                }
                sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                    AppError::NotFound("User or product".to_string())
                }
                _ => AppError::Database(e),
            })?
            .into_subscription()
    }

    async fn update_status(
        &self,
        id: i64,
        from: SubscriptionStatus,
        to: SubscriptionStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $3,
                cancelled_at = CASE WHEN $3 = 'cancelled' THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_active(&self, user_id: i64) -> Result<bool, AppError> {
        let active: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = $1 AND status = 'active')"#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(active)
    }

    async fn apply_payment(
        &self,
        payment: &SubscriptionPayment,
        period_end: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO subscription_payments (
                id, subscription_id, gateway_payment_id, amount_cents, currency, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (gateway_payment_id) DO NOTHING
            "#,
        )
        .bind(payment.id)
        .bind(payment.subscription_id)
        .bind(&payment.gateway_payment_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        // The period never moves backwards; a past-due subscription recovers.
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET current_period_end = CASE
                    WHEN $2::TIMESTAMPTZ IS NULL THEN current_period_end
                    ELSE GREATEST(COALESCE(current_period_end, $2), $2)
                END,
                status = CASE WHEN status = 'past_due' THEN 'active' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(payment.subscription_id)
        .bind(period_end)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn payments(&self, subscription_id: i64) -> Result<Vec<SubscriptionPayment>, AppError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, subscription_id, gateway_payment_id, amount_cents, currency, status, created_at
            FROM subscription_payments
            WHERE subscription_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_payment()).collect())
    }

    async fn find_lapsed(&self, cutoff: DateTime<Utc>) -> Result<Vec<Subscription>, AppError> {
        let query = format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE status = 'past_due'
              AND current_period_end IS NOT NULL
              AND current_period_end < $1
            "#,
            SUBSCRIPTION_COLUMNS
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&query)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        Self::collect(rows)
    }
}
