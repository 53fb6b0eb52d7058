//! Download Repository Implementation
//!
//! PostgreSQL implementation of the DownloadRepository trait. Redemption is
//! a single conditional UPDATE so concurrent requests cannot exceed the limit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{CustomerDownload, DownloadRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct DownloadRow {
    id: i64,
    token: String,
    order_id: i64,
    product_id: i64,
    email: String,
    download_count: i32,
    max_downloads: i32,
    expires_at: DateTime<Utc>,
    last_downloaded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl DownloadRow {
    fn into_download(self) -> CustomerDownload {
        CustomerDownload {
            id: self.id,
            token: self.token,
            order_id: self.order_id,
            product_id: self.product_id,
            email: self.email,
            download_count: self.download_count,
            max_downloads: self.max_downloads,
            expires_at: self.expires_at,
            last_downloaded_at: self.last_downloaded_at,
            created_at: self.created_at,
        }
    }
}

/// Insert grants on an open connection. Grants are only written as part of
/// marking an order paid.
pub(crate) async fn insert_downloads(
    conn: &mut PgConnection,
    downloads: &[CustomerDownload],
) -> Result<(), AppError> {
    for download in downloads {
        sqlx::query(
            r#"
            INSERT INTO customer_downloads (
                id, token, order_id, product_id, email, download_count,
                max_downloads, expires_at, last_downloaded_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(download.id)
        .bind(&download.token)
        .bind(download.order_id)
        .bind(download.product_id)
        .bind(&download.email)
        .bind(download.download_count)
        .bind(download.max_downloads)
        .bind(download.expires_at)
        .bind(download.last_downloaded_at)
        .bind(download.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// PostgreSQL download grant repository.
#[derive(Clone)]
pub struct PgDownloadRepository {
    pool: PgPool,
}

impl PgDownloadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DownloadRepository for PgDownloadRepository {
    async fn find_by_token(&self, token: &str) -> Result<Option<CustomerDownload>, AppError> {
        let row = sqlx::query_as::<_, DownloadRow>(
            r#"
            SELECT id, token, order_id, product_id, email, download_count, max_downloads,
                   expires_at, last_downloaded_at, created_at
            FROM customer_downloads
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_download()))
    }

    async fn list_for_order(&self, order_id: i64) -> Result<Vec<CustomerDownload>, AppError> {
        let rows = sqlx::query_as::<_, DownloadRow>(
            r#"
            SELECT id, token, order_id, product_id, email, download_count, max_downloads,
                   expires_at, last_downloaded_at, created_at
            FROM customer_downloads
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_download()).collect())
    }

    async fn redeem(&self, token: &str) -> Result<Option<CustomerDownload>, AppError> {
        let row = sqlx::query_as::<_, DownloadRow>(
            r#"
            UPDATE customer_downloads
            SET download_count = download_count + 1, last_downloaded_at = NOW()
            WHERE token = $1
              AND expires_at > NOW()
              AND download_count < max_downloads
            RETURNING id, token, order_id, product_id, email, download_count, max_downloads,
                      expires_at, last_downloaded_at, created_at
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_download()))
    }

    async fn reset(&self, id: i64, expires_at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE customer_downloads
            SET download_count = 0, expires_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(r#"DELETE FROM customer_downloads WHERE expires_at < $1"#)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
