//! Gallery Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{AlbumSummary, GalleryImage, GalleryRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct GalleryImageRow {
    id: i64,
    album: String,
    title: String,
    caption: Option<String>,
    stored_path: String,
    content_type: String,
    size_bytes: i64,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl GalleryImageRow {
    fn into_image(self) -> GalleryImage {
        GalleryImage {
            id: self.id,
            album: self.album,
            title: self.title,
            caption: self.caption,
            stored_path: self.stored_path,
            content_type: self.content_type,
            size_bytes: self.size_bytes,
            sort_order: self.sort_order,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AlbumRow {
    album: String,
    image_count: i64,
    cover_image_id: Option<i64>,
}

/// PostgreSQL gallery repository.
#[derive(Clone)]
pub struct PgGalleryRepository {
    pool: PgPool,
}

impl PgGalleryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GalleryRepository for PgGalleryRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<GalleryImage>, AppError> {
        let row = sqlx::query_as::<_, GalleryImageRow>(
            r#"
            SELECT id, album, title, caption, stored_path, content_type, size_bytes,
                   sort_order, created_at
            FROM gallery_images
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_image()))
    }

    async fn list_albums(&self) -> Result<Vec<AlbumSummary>, AppError> {
        let rows = sqlx::query_as::<_, AlbumRow>(
            r#"
            SELECT album,
                   COUNT(*) AS image_count,
                   (ARRAY_AGG(id ORDER BY sort_order ASC, id ASC))[1] AS cover_image_id
            FROM gallery_images
            GROUP BY album
            ORDER BY album ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AlbumSummary {
                album: r.album,
                image_count: r.image_count,
                cover_image_id: r.cover_image_id,
            })
            .collect())
    }

    async fn list_album(&self, album: &str) -> Result<Vec<GalleryImage>, AppError> {
        let rows = sqlx::query_as::<_, GalleryImageRow>(
            r#"
            SELECT id, album, title, caption, stored_path, content_type, size_bytes,
                   sort_order, created_at
            FROM gallery_images
            WHERE album = $1
            ORDER BY sort_order ASC, id ASC
            "#,
        )
        .bind(album)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_image()).collect())
    }

    async fn create(&self, image: &GalleryImage) -> Result<GalleryImage, AppError> {
        let row = sqlx::query_as::<_, GalleryImageRow>(
            r#"
            INSERT INTO gallery_images (
                id, album, title, caption, stored_path, content_type, size_bytes,
                sort_order, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, album, title, caption, stored_path, content_type, size_bytes,
                      sort_order, created_at
            "#,
        )
        .bind(image.id)
        .bind(&image.album)
        .bind(&image.title)
        .bind(&image.caption)
        .bind(&image.stored_path)
        .bind(&image.content_type)
        .bind(image.size_bytes)
        .bind(image.sort_order)
        .bind(image.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_image())
    }

    async fn next_sort_order(&self, album: &str) -> Result<i32, AppError> {
        let next: i32 = sqlx::query_scalar(
            r#"SELECT COALESCE(MAX(sort_order) + 1, 0) FROM gallery_images WHERE album = $1"#,
        )
        .bind(album)
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }

    async fn set_sort_order(&self, id: i64, sort_order: i32) -> Result<bool, AppError> {
        let result = sqlx::query(r#"UPDATE gallery_images SET sort_order = $2 WHERE id = $1"#)
            .bind(id)
            .bind(sort_order)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(r#"DELETE FROM gallery_images WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
