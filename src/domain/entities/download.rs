//! Customer download entity and repository trait.
//!
//! Maps to the `customer_downloads` table. A download token grants a bounded
//! number of downloads of one purchased digital product until it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Length of generated download tokens.
pub const DOWNLOAD_TOKEN_LEN: usize = 32;

/// Represents a download grant.
///
/// Maps to the `customer_downloads` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - token: VARCHAR(64) NOT NULL UNIQUE
/// - order_id: BIGINT NOT NULL REFERENCES orders(id)
/// - product_id: BIGINT NOT NULL REFERENCES products(id)
/// - email: VARCHAR(255) NOT NULL
/// - download_count: INTEGER NOT NULL DEFAULT 0
/// - max_downloads: INTEGER NOT NULL CHECK (max_downloads > 0)
/// - expires_at: TIMESTAMPTZ NOT NULL
/// - last_downloaded_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDownload {
    pub id: i64,
    pub token: String,
    pub order_id: i64,
    pub product_id: i64,
    pub email: String,
    pub download_count: i32,
    pub max_downloads: i32,
    pub expires_at: DateTime<Utc>,
    pub last_downloaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CustomerDownload {
    /// Issue a fresh grant.
    pub fn new(
        id: i64,
        order_id: i64,
        product_id: i64,
        email: &str,
        max_downloads: i32,
        valid_for: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            token: Self::generate_token(),
            order_id,
            product_id,
            email: email.to_string(),
            download_count: 0,
            max_downloads,
            expires_at: now + valid_for,
            last_downloaded_at: None,
            created_at: now,
        }
    }

    /// Generate a random alphanumeric token.
    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(DOWNLOAD_TOKEN_LEN)
            .map(char::from)
            .collect()
    }

    /// Check if the grant has expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Check if every allowed download has been used.
    pub fn is_exhausted(&self) -> bool {
        self.download_count >= self.max_downloads
    }

    /// Downloads still available.
    pub fn remaining(&self) -> i32 {
        (self.max_downloads - self.download_count).max(0)
    }

    /// Check if the grant can be redeemed right now.
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && !self.is_exhausted()
    }
}

/// Repository trait for download grants.
///
/// Grants are inserted by `OrderRepository::mark_paid`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DownloadRepository: Send + Sync {
    /// Find a grant by token.
    async fn find_by_token(&self, token: &str) -> Result<Option<CustomerDownload>, AppError>;

    /// Grants issued for an order.
    async fn list_for_order(&self, order_id: i64) -> Result<Vec<CustomerDownload>, AppError>;

    /// Atomically count one download.
    ///
    /// Only succeeds while the grant is unexpired and below its maximum;
    /// returns the updated grant, or None when nothing was counted.
    async fn redeem(&self, token: &str) -> Result<Option<CustomerDownload>, AppError>;

    /// Reset the counter and set a new expiry. Returns false if the grant does not exist.
    async fn reset(&self, id: i64, expires_at: DateTime<Utc>) -> Result<bool, AppError>;

    /// Delete grants that expired before `cutoff`.
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
