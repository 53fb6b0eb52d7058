//! Document Service
//!
//! Downloadable document library. Private documents are only visible to
//! store administrators.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{Document, DocumentRepository};
use crate::infrastructure::storage::{FileStore, StorageError};
use crate::shared::snowflake::SnowflakeGenerator;

const DOCUMENT_FOLDER: &str = "documents";

/// Document service trait
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Documents visible to the caller, optionally in one category
    async fn list(&self, include_private: bool, category: Option<&str>) -> Result<Vec<Document>, DocumentError>;

    async fn upload(&self, request: UploadDocumentDto) -> Result<Document, DocumentError>;

    async fn update_metadata(&self, id: i64, update: UpdateDocumentDto) -> Result<Document, DocumentError>;

    /// Delete the row and its file
    async fn delete(&self, id: i64) -> Result<(), DocumentError>;

    /// Count a download and return the document with its bytes
    async fn download(&self, id: i64, include_private: bool) -> Result<(Document, Vec<u8>), DocumentError>;
}

/// Uploaded document
#[derive(Debug, Clone)]
pub struct UploadDocumentDto {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub is_public: bool,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Metadata update; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

/// Document service errors
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Document not found")]
    NotFound,

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// DocumentService implementation
pub struct DocumentServiceImpl<D>
where
    D: DocumentRepository,
{
    document_repo: Arc<D>,
    files: FileStore,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<D> DocumentServiceImpl<D>
where
    D: DocumentRepository,
{
    pub fn new(document_repo: Arc<D>, files: FileStore, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            document_repo,
            files,
            id_generator,
        }
    }

    async fn load(&self, id: i64) -> Result<Document, DocumentError> {
        self.document_repo
            .find_by_id(id)
            .await
            .map_err(|e| DocumentError::Internal(e.to_string()))?
            .ok_or(DocumentError::NotFound)
    }
}

#[async_trait]
impl<D> DocumentService for DocumentServiceImpl<D>
where
    D: DocumentRepository + 'static,
{
    async fn list(&self, include_private: bool, category: Option<&str>) -> Result<Vec<Document>, DocumentError> {
        self.document_repo
            .list(!include_private, category)
            .await
            .map_err(|e| DocumentError::Internal(e.to_string()))
    }

    #[tracing::instrument(skip(self, request), fields(file_name = %request.file_name, size = request.bytes.len()))]
    async fn upload(&self, request: UploadDocumentDto) -> Result<Document, DocumentError> {
        if request.bytes.is_empty() {
            return Err(DocumentError::EmptyFile);
        }

        let stored_path = self
            .files
            .save(DOCUMENT_FOLDER, &request.file_name, &request.bytes)
            .await?;

        let document = Document {
            id: self.id_generator.generate(),
            title: request.title,
            description: request.description,
            category: request.category,
            file_name: request.file_name,
            stored_path,
            content_type: request.content_type,
            size_bytes: request.bytes.len() as i64,
            is_public: request.is_public,
            download_count: 0,
            created_at: Utc::now(),
        };

        match self.document_repo.create(&document).await {
            Ok(created) => Ok(created),
            Err(e) => {
                // Do not leave an orphaned file behind
                if let Err(cleanup) = self.files.delete(&document.stored_path).await {
                    tracing::warn!("Failed to remove orphaned upload: {}", cleanup);
                }
                Err(DocumentError::Internal(e.to_string()))
            }
        }
    }

    async fn update_metadata(&self, id: i64, update: UpdateDocumentDto) -> Result<Document, DocumentError> {
        let mut document = self.load(id).await?;

        if let Some(title) = update.title {
            document.title = title;
        }
        if let Some(description) = update.description {
            document.description = Some(description);
        }
        if let Some(category) = update.category {
            document.category = category;
        }
        if let Some(is_public) = update.is_public {
            document.is_public = is_public;
        }

        self.document_repo
            .update_metadata(&document)
            .await
            .map_err(|e| DocumentError::Internal(e.to_string()))
    }

    async fn delete(&self, id: i64) -> Result<(), DocumentError> {
        let document = self.load(id).await?;

        self.document_repo
            .delete(id)
            .await
            .map_err(|e| DocumentError::Internal(e.to_string()))?;

        if let Err(e) = self.files.delete(&document.stored_path).await {
            tracing::warn!(document_id = id, "Document row deleted but file removal failed: {}", e);
        }
        Ok(())
    }

    async fn download(&self, id: i64, include_private: bool) -> Result<(Document, Vec<u8>), DocumentError> {
        let document = self.load(id).await?;
        if !document.is_public && !include_private {
            return Err(DocumentError::NotFound);
        }

        let bytes = self.files.read(&document.stored_path).await?;

        self.document_repo
            .increment_downloads(id)
            .await
            .map_err(|e| DocumentError::Internal(e.to_string()))?;

        Ok((document, bytes))
    }
}
