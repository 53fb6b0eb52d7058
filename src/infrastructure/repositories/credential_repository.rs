//! Credential Repository Implementation
//!
//! Stores AES-GCM ciphertext and nonce; never sees plaintext.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{CredentialRepository, SystemCredential};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    key: String,
    category: String,
    description: Option<String>,
    ciphertext: Vec<u8>,
    nonce: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CredentialRow {
    fn into_credential(self) -> SystemCredential {
        SystemCredential {
            id: self.id,
            key: self.key,
            category: self.category,
            description: self.description,
            ciphertext: self.ciphertext,
            nonce: self.nonce,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL credential repository.
#[derive(Clone)]
pub struct PgCredentialRepository {
    pool: PgPool,
}

impl PgCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for PgCredentialRepository {
    async fn find_by_key(&self, key: &str) -> Result<Option<SystemCredential>, AppError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, key, category, description, ciphertext, nonce, created_at, updated_at
            FROM system_credentials
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_credential()))
    }

    async fn list(&self) -> Result<Vec<SystemCredential>, AppError> {
        let rows = sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, key, category, description, ciphertext, nonce, created_at, updated_at
            FROM system_credentials
            ORDER BY key ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_credential()).collect())
    }

    async fn upsert(&self, credential: &SystemCredential) -> Result<SystemCredential, AppError> {
        let row = sqlx::query_as::<_, CredentialRow>(
            r#"
            INSERT INTO system_credentials (
                id, key, category, description, ciphertext, nonce, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (key) DO UPDATE
            SET category = EXCLUDED.category,
                description = EXCLUDED.description,
                ciphertext = EXCLUDED.ciphertext,
                nonce = EXCLUDED.nonce,
                updated_at = NOW()
            RETURNING id, key, category, description, ciphertext, nonce, created_at, updated_at
            "#,
        )
        .bind(credential.id)
        .bind(&credential.key)
        .bind(&credential.category)
        .bind(&credential.description)
        .bind(&credential.ciphertext)
        .bind(&credential.nonce)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_credential())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let result = sqlx::query(r#"DELETE FROM system_credentials WHERE key = $1"#)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
