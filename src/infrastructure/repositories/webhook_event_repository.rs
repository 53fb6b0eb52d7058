//! Webhook Event Repository Implementation

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{PaymentProvider, WebhookEventRepository};
use crate::shared::error::AppError;

/// PostgreSQL webhook delivery ledger.
#[derive(Clone)]
pub struct PgWebhookEventRepository {
    pool: PgPool,
}

impl PgWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PgWebhookEventRepository {
    async fn record(
        &self,
        provider: PaymentProvider,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (provider, event_id, event_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (provider, event_id) DO NOTHING
            "#,
        )
        .bind(provider.as_str())
        .bind(event_id)
        .bind(event_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn forget(&self, provider: PaymentProvider, event_id: &str) -> Result<(), AppError> {
        sqlx::query(r#"DELETE FROM webhook_events WHERE provider = $1 AND event_id = $2"#)
            .bind(provider.as_str())
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
