//! Document library entity and repository trait.
//!
//! Maps to the `documents` table. The file itself lives in the file store
//! under `stored_path`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A downloadable document (PDF, spreadsheet, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    /// Original file name as uploaded
    pub file_name: String,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub is_public: bool,
    pub download_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Document data access operations.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, AppError>;

    /// Documents ordered by category then title.
    async fn list(
        &self,
        public_only: bool,
        category: Option<&str>,
    ) -> Result<Vec<Document>, AppError>;

    async fn create(&self, document: &Document) -> Result<Document, AppError>;

    /// Update title, description, category and visibility.
    async fn update_metadata(&self, document: &Document) -> Result<Document, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    async fn increment_downloads(&self, id: i64) -> Result<(), AppError>;
}
