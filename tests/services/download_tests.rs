//! Download grant redemption.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_test::{assert_err, assert_ok};
use storefront::application::services::{DownloadError, DownloadService, DownloadServiceImpl};
use storefront::domain::{CustomerDownload, ProductKind};

use crate::common::fakes::{InMemoryDownloads, InMemoryProducts};
use crate::common::product;

fn service(
    downloads: Arc<InMemoryDownloads>,
) -> DownloadServiceImpl<InMemoryDownloads, InMemoryProducts> {
    let products = Arc::new(InMemoryProducts::with(vec![product(3, ProductKind::Digital, 900)]));
    DownloadServiceImpl::new(downloads, products, Duration::hours(72), "https://shop.test")
}

fn grant(downloads: &InMemoryDownloads, max: i32, valid_for: Duration) -> CustomerDownload {
    let grant = CustomerDownload::new(1, 2, 3, "reader@example.com", max, valid_for);
    downloads.insert(std::slice::from_ref(&grant)).unwrap();
    grant
}

#[tokio::test]
async fn test_grant_stops_at_max_downloads() {
    let downloads = Arc::new(InMemoryDownloads::default());
    let grant = grant(&downloads, 2, Duration::hours(1));
    let service = service(downloads.clone());

    let first = assert_ok!(service.redeem(&grant.token).await);
    assert_eq!(first.file_path, "products/3.zip");
    assert_eq!(first.download.download_count, 1);
    service.redeem(&grant.token).await.unwrap();

    let err = assert_err!(service.redeem(&grant.token).await);
    assert!(matches!(err, DownloadError::LimitReached));
    assert_eq!(downloads.all()[0].download_count, 2);
}

#[tokio::test]
async fn test_expired_grant_is_refused() {
    let downloads = Arc::new(InMemoryDownloads::default());
    let grant = grant(&downloads, 5, Duration::seconds(-1));

    let err = service(downloads).redeem(&grant.token).await.unwrap_err();

    assert!(matches!(err, DownloadError::Expired));
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let err = service(Arc::new(InMemoryDownloads::default()))
        .redeem("no-such-token")
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::NotFound));
}

#[tokio::test]
async fn test_reset_restores_an_exhausted_grant() {
    let downloads = Arc::new(InMemoryDownloads::default());
    let grant = grant(&downloads, 1, Duration::hours(1));
    let service = service(downloads.clone());
    service.redeem(&grant.token).await.unwrap();

    service.reset(grant.id).await.unwrap();

    let restored = &downloads.all()[0];
    assert_eq!(restored.download_count, 0);
    assert!(restored.expires_at > Utc::now() + Duration::hours(71));
    service.redeem(&grant.token).await.unwrap();
}
