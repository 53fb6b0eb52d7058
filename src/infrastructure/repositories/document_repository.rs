//! Document Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Document, DocumentRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    title: String,
    description: Option<String>,
    category: String,
    file_name: String,
    stored_path: String,
    content_type: String,
    size_bytes: i64,
    is_public: bool,
    download_count: i32,
    created_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_document(self) -> Document {
        Document {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            file_name: self.file_name,
            stored_path: self.stored_path,
            content_type: self.content_type,
            size_bytes: self.size_bytes,
            is_public: self.is_public,
            download_count: self.download_count,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL document repository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: PgPool,
}

impl PgDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Document>, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, title, description, category, file_name, stored_path, content_type,
                   size_bytes, is_public, download_count, created_at
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_document()))
    }

    async fn list(
        &self,
        public_only: bool,
        category: Option<&str>,
    ) -> Result<Vec<Document>, AppError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, title, description, category, file_name, stored_path, content_type,
                   size_bytes, is_public, download_count, created_at
            FROM documents
            WHERE ($1 = FALSE OR is_public = TRUE)
              AND ($2::VARCHAR IS NULL OR category = $2::VARCHAR)
            ORDER BY category ASC, title ASC
            "#,
        )
        .bind(public_only)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_document()).collect())
    }

    async fn create(&self, document: &Document) -> Result<Document, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (
                id, title, description, category, file_name, stored_path, content_type,
                size_bytes, is_public, download_count, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, title, description, category, file_name, stored_path, content_type,
                      size_bytes, is_public, download_count, created_at
            "#,
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.category)
        .bind(&document.file_name)
        .bind(&document.stored_path)
        .bind(&document.content_type)
        .bind(document.size_bytes)
        .bind(document.is_public)
        .bind(document.download_count)
        .bind(document.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_document())
    }

    async fn update_metadata(&self, document: &Document) -> Result<Document, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE documents
            SET title = $2, description = $3, category = $4, is_public = $5
            WHERE id = $1
            RETURNING id, title, description, category, file_name, stored_path, content_type,
                      size_bytes, is_public, download_count, created_at
            "#,
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.description)
        .bind(&document.category)
        .bind(document.is_public)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document.id)))?;

        Ok(row.into_document())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(r#"DELETE FROM documents WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_downloads(&self, id: i64) -> Result<(), AppError> {
        sqlx::query(r#"UPDATE documents SET download_count = download_count + 1 WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
