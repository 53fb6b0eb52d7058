//! System credential entity and repository trait.
//!
//! Maps to the `system_credentials` table. Values are AES-256-GCM
//! ciphertext; plaintext never touches the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Well-known credential keys.
pub mod keys {
    pub const STRIPE_SECRET_KEY: &str = "stripe.secret_key";
    pub const STRIPE_WEBHOOK_SECRET: &str = "stripe.webhook_secret";
    pub const PAYPAL_CLIENT_ID: &str = "paypal.client_id";
    pub const PAYPAL_CLIENT_SECRET: &str = "paypal.client_secret";
    pub const PAYPAL_WEBHOOK_ID: &str = "paypal.webhook_id";
    pub const EMAIL_API_KEY: &str = "email.api_key";
}

/// An encrypted secret.
///
/// - key: VARCHAR(128) NOT NULL UNIQUE (dotted name, e.g. `stripe.secret_key`)
/// - category: VARCHAR(50) NOT NULL
/// - ciphertext / nonce: BYTEA NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemCredential {
    pub id: i64,
    pub key: String,
    pub category: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub ciphertext: Vec<u8>,
    #[serde(skip_serializing)]
    pub nonce: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemCredential {
    /// Valid keys are lowercase dotted identifiers: `[a-z0-9_]+(\.[a-z0-9_]+)*`.
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= 128
            && key.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
            })
    }

    /// Environment variable consulted when the key is not stored
    /// (`stripe.secret_key` -> `STRIPE_SECRET_KEY`).
    pub fn env_fallback_name(key: &str) -> String {
        key.replace('.', "_").to_ascii_uppercase()
    }
}

/// Repository trait for credential rows.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn find_by_key(&self, key: &str) -> Result<Option<SystemCredential>, AppError>;

    /// All credentials ordered by key.
    async fn list(&self) -> Result<Vec<SystemCredential>, AppError>;

    /// Insert or replace by key.
    async fn upsert(&self, credential: &SystemCredential) -> Result<SystemCredential, AppError>;

    /// Delete by key. Returns false if nothing was stored.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
}

/// Read access to decrypted secrets, used by gateway and mail clients.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Plaintext for `key`. Fails when the secret is not configured.
    async fn secret(&self, key: &str) -> Result<String, AppError>;
}
