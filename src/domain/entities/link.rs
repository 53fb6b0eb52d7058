//! Curated link entity and repository trait.
//!
//! Maps to the `links` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub category: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait LinkRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Link>, AppError>;

    /// Links ordered by category, sort order, title.
    async fn list(&self, active_only: bool) -> Result<Vec<Link>, AppError>;

    async fn create(&self, link: &Link) -> Result<Link, AppError>;

    async fn update(&self, link: &Link) -> Result<Link, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}
