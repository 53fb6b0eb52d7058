//! Gallery image entity and repository trait.
//!
//! Maps to the `gallery_images` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// An image in a named album.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: i64,
    pub album: String,
    pub title: String,
    pub caption: Option<String>,
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Album listing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumSummary {
    pub album: String,
    pub image_count: i64,
    pub cover_image_id: Option<i64>,
}

#[async_trait]
pub trait GalleryRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<GalleryImage>, AppError>;

    /// Albums with image counts; the cover is the first image by sort order.
    async fn list_albums(&self) -> Result<Vec<AlbumSummary>, AppError>;

    /// Images of an album by sort order.
    async fn list_album(&self, album: &str) -> Result<Vec<GalleryImage>, AppError>;

    async fn create(&self, image: &GalleryImage) -> Result<GalleryImage, AppError>;

    /// Sort order for an image appended to `album`.
    async fn next_sort_order(&self, album: &str) -> Result<i32, AppError>;

    async fn set_sort_order(&self, id: i64, sort_order: i32) -> Result<bool, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}
