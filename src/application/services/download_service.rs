//! Download Service
//!
//! Redeems expiring, count-limited download tokens for purchased digital
//! products.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::{CustomerDownload, DownloadRepository, ProductRepository};
use crate::infrastructure::metrics;

/// Expired grants are kept this long before maintenance deletes them.
pub const EXPIRED_DOWNLOAD_RETENTION_DAYS: i64 = 30;

/// Download service trait
#[async_trait]
pub trait DownloadService: Send + Sync {
    /// Count one download and return the file to serve
    async fn redeem(&self, token: &str) -> Result<RedeemedDownload, DownloadError>;

    /// Grants issued for an order
    async fn list_for_order(&self, order_id: i64) -> Result<Vec<DownloadDto>, DownloadError>;

    /// Zero the counter and restart the validity window
    async fn reset(&self, download_id: i64) -> Result<(), DownloadError>;

    /// Delete grants that expired more than the retention period before `now`
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DownloadError>;
}

/// A counted download
#[derive(Debug, Clone)]
pub struct RedeemedDownload {
    pub download: CustomerDownload,
    pub product_name: String,
    /// Stored path of the product file
    pub file_path: String,
}

/// Download grant as shown to customers
#[derive(Debug, Clone, Serialize)]
pub struct DownloadDto {
    pub id: String,
    pub product_id: String,
    pub url: String,
    pub download_count: i32,
    pub max_downloads: i32,
    pub remaining: i32,
    pub expires_at: String,
}

impl DownloadDto {
    pub fn from_download(download: &CustomerDownload, public_base_url: &str) -> Self {
        Self {
            id: download.id.to_string(),
            product_id: download.product_id.to_string(),
            url: format!(
                "{}/api/downloads/{}",
                public_base_url.trim_end_matches('/'),
                download.token
            ),
            download_count: download.download_count,
            max_downloads: download.max_downloads,
            remaining: download.remaining(),
            expires_at: download.expires_at.to_rfc3339(),
        }
    }
}

/// Download service errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Download not found")]
    NotFound,

    #[error("Download link has expired")]
    Expired,

    #[error("Download limit reached")]
    LimitReached,

    #[error("Product file is missing")]
    FileMissing,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// DownloadService implementation
pub struct DownloadServiceImpl<D, P>
where
    D: DownloadRepository,
    P: ProductRepository,
{
    download_repo: Arc<D>,
    product_repo: Arc<P>,
    valid_for: Duration,
    public_base_url: String,
}

impl<D, P> DownloadServiceImpl<D, P>
where
    D: DownloadRepository,
    P: ProductRepository,
{
    pub fn new(
        download_repo: Arc<D>,
        product_repo: Arc<P>,
        valid_for: Duration,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            download_repo,
            product_repo,
            valid_for,
            public_base_url: public_base_url.into(),
        }
    }
}

/// Why a grant cannot be redeemed right now.
fn refusal(download: &CustomerDownload, now: DateTime<Utc>) -> Option<DownloadError> {
    if download.is_expired_at(now) {
        Some(DownloadError::Expired)
    } else if download.is_exhausted() {
        Some(DownloadError::LimitReached)
    } else {
        None
    }
}

#[async_trait]
impl<D, P> DownloadService for DownloadServiceImpl<D, P>
where
    D: DownloadRepository + 'static,
    P: ProductRepository + 'static,
{
    async fn redeem(&self, token: &str) -> Result<RedeemedDownload, DownloadError> {
        let grant = self
            .download_repo
            .find_by_token(token)
            .await
            .map_err(|e| DownloadError::Internal(e.to_string()))?
            .ok_or(DownloadError::NotFound)?;

        if let Some(refused) = refusal(&grant, Utc::now()) {
            return Err(refused);
        }

        // The conditional update is what enforces the limit under concurrency;
        // the checks above only pick the error for the common case.
        let download = match self
            .download_repo
            .redeem(token)
            .await
            .map_err(|e| DownloadError::Internal(e.to_string()))?
        {
            Some(download) => download,
            None => {
                let current = self
                    .download_repo
                    .find_by_token(token)
                    .await
                    .map_err(|e| DownloadError::Internal(e.to_string()))?
                    .ok_or(DownloadError::NotFound)?;
                return Err(refusal(&current, Utc::now()).unwrap_or(DownloadError::LimitReached));
            }
        };

        let product = self
            .product_repo
            .find_by_id(download.product_id)
            .await
            .map_err(|e| DownloadError::Internal(e.to_string()))?
            .ok_or(DownloadError::FileMissing)?;
        let file_path = product.digital_file_path.ok_or(DownloadError::FileMissing)?;

        metrics::record_download_redeemed();
        tracing::info!(
            download_id = download.id,
            count = download.download_count,
            max = download.max_downloads,
            "Download redeemed"
        );

        Ok(RedeemedDownload {
            download,
            product_name: product.name,
            file_path,
        })
    }

    async fn list_for_order(&self, order_id: i64) -> Result<Vec<DownloadDto>, DownloadError> {
        let downloads = self
            .download_repo
            .list_for_order(order_id)
            .await
            .map_err(|e| DownloadError::Internal(e.to_string()))?;

        Ok(downloads
            .iter()
            .map(|d| DownloadDto::from_download(d, &self.public_base_url))
            .collect())
    }

    async fn reset(&self, download_id: i64) -> Result<(), DownloadError> {
        let found = self
            .download_repo
            .reset(download_id, Utc::now() + self.valid_for)
            .await
            .map_err(|e| DownloadError::Internal(e.to_string()))?;

        if !found {
            return Err(DownloadError::NotFound);
        }
        tracing::info!(download_id, "Download grant reset");
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, DownloadError> {
        self.download_repo
            .delete_expired_before(now - Duration::days(EXPIRED_DOWNLOAD_RETENTION_DAYS))
            .await
            .map_err(|e| DownloadError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockDownloadRepository, MockProductRepository, Product, ProductKind};
    use mockall::predicate::eq;

    fn grant(count: i32, max: i32, expires_in: Duration) -> CustomerDownload {
        let now = Utc::now();
        CustomerDownload {
            id: 10,
            token: "tok".into(),
            order_id: 1,
            product_id: 2,
            email: "buyer@example.com".into(),
            download_count: count,
            max_downloads: max,
            expires_at: now + expires_in,
            last_downloaded_at: None,
            created_at: now,
        }
    }

    fn ebook() -> Product {
        let now = Utc::now();
        Product {
            id: 2,
            sku: "EBOOK".into(),
            slug: "ebook".into(),
            name: "E-book".into(),
            description: None,
            kind: ProductKind::Digital,
            price_cents: 1500,
            member_price_cents: None,
            stock_quantity: None,
            billing_interval: None,
            stripe_price_id: None,
            paypal_plan_id: None,
            digital_file_path: Some("products/ebook.pdf".into()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn service(
        downloads: MockDownloadRepository,
        products: MockProductRepository,
    ) -> DownloadServiceImpl<MockDownloadRepository, MockProductRepository> {
        DownloadServiceImpl::new(
            Arc::new(downloads),
            Arc::new(products),
            Duration::hours(72),
            "https://shop.example.com/",
        )
    }

    #[tokio::test]
    async fn test_redeem_counts_and_returns_file() {
        let mut downloads = MockDownloadRepository::new();
        downloads
            .expect_find_by_token()
            .with(eq("tok"))
            .returning(|_| Ok(Some(grant(1, 3, Duration::hours(1)))));
        downloads
            .expect_redeem()
            .times(1)
            .returning(|_| Ok(Some(grant(2, 3, Duration::hours(1)))));
        let mut products = MockProductRepository::new();
        products
            .expect_find_by_id()
            .with(eq(2))
            .returning(|_| Ok(Some(ebook())));

        let redeemed = service(downloads, products).redeem("tok").await.unwrap();
        assert_eq!(redeemed.file_path, "products/ebook.pdf");
        assert_eq!(redeemed.download.download_count, 2);
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let mut downloads = MockDownloadRepository::new();
        downloads.expect_find_by_token().returning(|_| Ok(None));
        downloads.expect_redeem().never();

        let err = service(downloads, MockProductRepository::new())
            .redeem("nope")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::NotFound));
    }

    #[tokio::test]
    async fn test_expired_token_is_gone() {
        let mut downloads = MockDownloadRepository::new();
        downloads
            .expect_find_by_token()
            .returning(|_| Ok(Some(grant(0, 3, Duration::hours(-1)))));
        downloads.expect_redeem().never();

        let err = service(downloads, MockProductRepository::new())
            .redeem("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Expired));
    }

    #[tokio::test]
    async fn test_exhausted_token_is_refused() {
        let mut downloads = MockDownloadRepository::new();
        downloads
            .expect_find_by_token()
            .returning(|_| Ok(Some(grant(3, 3, Duration::hours(1)))));
        downloads.expect_redeem().never();

        let err = service(downloads, MockProductRepository::new())
            .redeem("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::LimitReached));
    }

    #[tokio::test]
    async fn test_lost_race_reports_limit() {
        // Last download taken by a concurrent request between check and update
        let mut downloads = MockDownloadRepository::new();
        let mut seq = mockall::Sequence::new();
        downloads
            .expect_find_by_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(grant(2, 3, Duration::hours(1)))));
        downloads
            .expect_redeem()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        downloads
            .expect_find_by_token()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(grant(3, 3, Duration::hours(1)))));

        let err = service(downloads, MockProductRepository::new())
            .redeem("tok")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::LimitReached));
    }

    #[tokio::test]
    async fn test_purge_keeps_recently_expired_grants() {
        let now = Utc::now();
        let mut downloads = MockDownloadRepository::new();
        downloads
            .expect_delete_expired_before()
            .with(eq(now - Duration::days(EXPIRED_DOWNLOAD_RETENTION_DAYS)))
            .returning(|_| Ok(4));

        let purged = service(downloads, MockProductRepository::new())
            .purge_expired(now)
            .await
            .unwrap();
        assert_eq!(purged, 4);
    }

    #[test]
    fn test_download_url() {
        let dto = DownloadDto::from_download(&grant(1, 5, Duration::hours(1)), "https://shop.example.com/");
        assert_eq!(dto.url, "https://shop.example.com/api/downloads/tok");
        assert_eq!(dto.remaining, 4);
    }
}
