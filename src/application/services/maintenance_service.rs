//! Maintenance Service
//!
//! Periodic housekeeping run by the background task started at boot.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::infrastructure::cache::CredentialCache;

use super::download_service::DownloadService;
use super::subscription_service::SubscriptionService;

/// What one maintenance pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub subscriptions_expired: usize,
    pub downloads_purged: u64,
    pub cache_entries_purged: usize,
}

/// Housekeeping over subscriptions, downloads and the credential cache
pub struct MaintenanceService {
    subscriptions: Arc<dyn SubscriptionService>,
    downloads: Arc<dyn DownloadService>,
    credential_cache: Arc<CredentialCache>,
    past_due_grace: Duration,
}

impl MaintenanceService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionService>,
        downloads: Arc<dyn DownloadService>,
        credential_cache: Arc<CredentialCache>,
        past_due_grace: Duration,
    ) -> Self {
        Self {
            subscriptions,
            downloads,
            credential_cache,
            past_due_grace,
        }
    }

    /// Run every task once. A failing task is logged and the rest still run.
    pub async fn run_once(&self) -> MaintenanceReport {
        let now = Utc::now();
        let mut report = MaintenanceReport::default();

        match self.subscriptions.expire_lapsed(now, self.past_due_grace).await {
            Ok(count) => report.subscriptions_expired = count,
            Err(e) => tracing::error!("Expiring lapsed subscriptions failed: {}", e),
        }

        match self.downloads.purge_expired(now).await {
            Ok(count) => report.downloads_purged = count,
            Err(e) => tracing::error!("Purging expired downloads failed: {}", e),
        }

        report.cache_entries_purged = self.credential_cache.purge_expired();

        if report != MaintenanceReport::default() {
            tracing::info!(
                subscriptions_expired = report.subscriptions_expired,
                downloads_purged = report.downloads_purged,
                cache_entries_purged = report.cache_entries_purged,
                "Maintenance pass finished"
            );
        }
        report
    }
}
