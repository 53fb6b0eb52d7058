//! Processed webhook delivery ledger.
//!
//! Maps to the `webhook_events` table, keyed by `(provider, event_id)`.

use async_trait::async_trait;

use crate::domain::value_objects::PaymentProvider;
use crate::shared::error::AppError;

/// Repository trait for webhook de-duplication.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Record a delivery. Returns false when the event id was seen before.
    async fn record(
        &self,
        provider: PaymentProvider,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, AppError>;

    /// Drop a recorded delivery so a provider retry is processed again.
    async fn forget(&self, provider: PaymentProvider, event_id: &str) -> Result<(), AppError>;
}
