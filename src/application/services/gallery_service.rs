//! Gallery Service
//!
//! Image albums. Images are ordered by `sort_order` within an album.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{AlbumSummary, GalleryImage, GalleryRepository};
use crate::infrastructure::storage::{FileStore, StorageError};
use crate::shared::snowflake::SnowflakeGenerator;

const GALLERY_FOLDER: &str = "gallery";

/// Gallery service trait
#[async_trait]
pub trait GalleryService: Send + Sync {
    async fn list_albums(&self) -> Result<Vec<AlbumSummary>, GalleryError>;

    async fn list_album(&self, album: &str) -> Result<Vec<GalleryImage>, GalleryError>;

    /// Store an image at the end of its album
    async fn upload(&self, request: UploadImageDto) -> Result<GalleryImage, GalleryError>;

    /// Rewrite sort positions to follow `ordered_ids`
    async fn reorder(&self, album: &str, ordered_ids: &[i64]) -> Result<Vec<GalleryImage>, GalleryError>;

    async fn delete(&self, id: i64) -> Result<(), GalleryError>;

    /// Image with its bytes
    async fn image_file(&self, id: i64) -> Result<(GalleryImage, Vec<u8>), GalleryError>;
}

/// Uploaded image
#[derive(Debug, Clone)]
pub struct UploadImageDto {
    pub album: String,
    pub title: String,
    pub caption: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Gallery service errors
#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("Image not found")]
    NotFound,

    #[error("Only image uploads are accepted")]
    NotAnImage,

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Image {0} is not in this album")]
    NotInAlbum(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// GalleryService implementation
pub struct GalleryServiceImpl<G>
where
    G: GalleryRepository,
{
    gallery_repo: Arc<G>,
    files: FileStore,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<G> GalleryServiceImpl<G>
where
    G: GalleryRepository,
{
    pub fn new(gallery_repo: Arc<G>, files: FileStore, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            gallery_repo,
            files,
            id_generator,
        }
    }

    async fn load(&self, id: i64) -> Result<GalleryImage, GalleryError> {
        self.gallery_repo
            .find_by_id(id)
            .await
            .map_err(|e| GalleryError::Internal(e.to_string()))?
            .ok_or(GalleryError::NotFound)
    }
}

/// Whether a declared content type is an image.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

#[async_trait]
impl<G> GalleryService for GalleryServiceImpl<G>
where
    G: GalleryRepository + 'static,
{
    async fn list_albums(&self) -> Result<Vec<AlbumSummary>, GalleryError> {
        self.gallery_repo
            .list_albums()
            .await
            .map_err(|e| GalleryError::Internal(e.to_string()))
    }

    async fn list_album(&self, album: &str) -> Result<Vec<GalleryImage>, GalleryError> {
        self.gallery_repo
            .list_album(album)
            .await
            .map_err(|e| GalleryError::Internal(e.to_string()))
    }

    #[tracing::instrument(skip(self, request), fields(album = %request.album, size = request.bytes.len()))]
    async fn upload(&self, request: UploadImageDto) -> Result<GalleryImage, GalleryError> {
        if !is_image_content_type(&request.content_type) {
            return Err(GalleryError::NotAnImage);
        }
        if request.bytes.is_empty() {
            return Err(GalleryError::EmptyFile);
        }

        let sort_order = self
            .gallery_repo
            .next_sort_order(&request.album)
            .await
            .map_err(|e| GalleryError::Internal(e.to_string()))?;

        let stored_path = self
            .files
            .save(GALLERY_FOLDER, &request.file_name, &request.bytes)
            .await?;

        let image = GalleryImage {
            id: self.id_generator.generate(),
            album: request.album,
            title: request.title,
            caption: request.caption,
            stored_path,
            content_type: request.content_type,
            size_bytes: request.bytes.len() as i64,
            sort_order,
            created_at: Utc::now(),
        };

        match self.gallery_repo.create(&image).await {
            Ok(created) => Ok(created),
            Err(e) => {
                if let Err(cleanup) = self.files.delete(&image.stored_path).await {
                    tracing::warn!("Failed to remove orphaned upload: {}", cleanup);
                }
                Err(GalleryError::Internal(e.to_string()))
            }
        }
    }

    async fn reorder(&self, album: &str, ordered_ids: &[i64]) -> Result<Vec<GalleryImage>, GalleryError> {
        let images = self.list_album(album).await?;
        if let Some(stray) = ordered_ids
            .iter()
            .find(|id| !images.iter().any(|image| image.id == **id))
        {
            return Err(GalleryError::NotInAlbum(*stray));
        }

        for (position, id) in ordered_ids.iter().enumerate() {
            self.gallery_repo
                .set_sort_order(*id, position as i32)
                .await
                .map_err(|e| GalleryError::Internal(e.to_string()))?;
        }

        self.list_album(album).await
    }

    async fn delete(&self, id: i64) -> Result<(), GalleryError> {
        let image = self.load(id).await?;

        self.gallery_repo
            .delete(id)
            .await
            .map_err(|e| GalleryError::Internal(e.to_string()))?;

        if let Err(e) = self.files.delete(&image.stored_path).await {
            tracing::warn!(image_id = id, "Image row deleted but file removal failed: {}", e);
        }
        Ok(())
    }

    async fn image_file(&self, id: i64) -> Result<(GalleryImage, Vec<u8>), GalleryError> {
        let image = self.load(id).await?;
        let bytes = self.files.read(&image.stored_path).await?;
        Ok((image, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("image/png" => true)]
    #[test_case("IMAGE/JPEG" => true)]
    #[test_case("image/" => false)]
    #[test_case("application/pdf" => false)]
    #[test_case("text/html; image/png" => false)]
    fn content_type_check(content_type: &str) -> bool {
        is_image_content_type(content_type)
    }
}
