//! Link Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Link, LinkRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct LinkRow {
    id: i64,
    title: String,
    url: String,
    category: String,
    description: Option<String>,
    sort_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl LinkRow {
    fn into_link(self) -> Link {
        Link {
            id: self.id,
            title: self.title,
            url: self.url,
            category: self.category,
            description: self.description,
            sort_order: self.sort_order,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL link repository.
#[derive(Clone)]
pub struct PgLinkRepository {
    pool: PgPool,
}

impl PgLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Link>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, title, url, category, description, sort_order, is_active, created_at
            FROM links
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_link()))
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Link>, AppError> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, title, url, category, description, sort_order, is_active, created_at
            FROM links
            WHERE ($1 = FALSE OR is_active = TRUE)
            ORDER BY category ASC, sort_order ASC, title ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_link()).collect())
    }

    async fn create(&self, link: &Link) -> Result<Link, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            INSERT INTO links (id, title, url, category, description, sort_order, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, title, url, category, description, sort_order, is_active, created_at
            "#,
        )
        .bind(link.id)
        .bind(&link.title)
        .bind(&link.url)
        .bind(&link.category)
        .bind(&link.description)
        .bind(link.sort_order)
        .bind(link.is_active)
        .bind(link.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_link())
    }

    async fn update(&self, link: &Link) -> Result<Link, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            UPDATE links
            SET title = $2, url = $3, category = $4, description = $5,
                sort_order = $6, is_active = $7
            WHERE id = $1
            RETURNING id, title, url, category, description, sort_order, is_active, created_at
            "#,
        )
        .bind(link.id)
        .bind(&link.title)
        .bind(&link.url)
        .bind(&link.category)
        .bind(&link.description)
        .bind(link.sort_order)
        .bind(link.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Link {} not found", link.id)))?;

        Ok(row.into_link())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(r#"DELETE FROM links WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
