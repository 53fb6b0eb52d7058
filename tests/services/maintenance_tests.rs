//! Housekeeping pass.

use std::sync::Arc;

use chrono::Duration;
use pretty_assertions::assert_eq;
use storefront::application::services::MaintenanceReport;
use storefront::domain::{CustomerDownload, SubscriptionStatus};
use storefront::infrastructure::cache::CredentialCache;

use super::{subscription, Store};

#[tokio::test]
async fn test_run_once_expires_purges_and_evicts() {
    let lapsed = subscription(7, SubscriptionStatus::PastDue, Duration::days(-10));
    let lapsed_id = lapsed.id;
    let store = Store::new(vec![], vec![lapsed, subscription(8, SubscriptionStatus::Active, Duration::days(5))]);

    let stale = CustomerDownload::new(1, 1, 1, "old@example.com", 3, Duration::days(-40));
    let fresh = CustomerDownload::new(2, 2, 1, "new@example.com", 3, Duration::days(2));
    store.downloads.insert(&[stale, fresh.clone()]).unwrap();

    let cache = Arc::new(CredentialCache::new(std::time::Duration::ZERO));
    cache.insert("stripe.secret_key", "sk_test".into());

    let report = store.maintenance(cache.clone()).run_once().await;

    assert_eq!(
        report,
        MaintenanceReport {
            subscriptions_expired: 1,
            downloads_purged: 1,
            cache_entries_purged: 1,
        }
    );
    assert_eq!(store.subscriptions.get(lapsed_id).unwrap().status, SubscriptionStatus::Expired);
    assert_eq!(store.subscriptions.get(908).unwrap().status, SubscriptionStatus::Active);
    let remaining = store.downloads.all();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].token, fresh.token);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_second_run_has_nothing_to_do() {
    let store = Store::new(vec![], vec![subscription(7, SubscriptionStatus::PastDue, Duration::days(-10))]);
    let maintenance = store.maintenance(Arc::new(CredentialCache::new(std::time::Duration::from_secs(300))));

    maintenance.run_once().await;
    let second = maintenance.run_once().await;

    assert_eq!(second, MaintenanceReport::default());
}
