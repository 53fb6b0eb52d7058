//! Credential Service
//!
//! Encrypted secrets stored in the database. Reads go through a short-lived
//! in-memory cache; a key missing from the store falls back to an
//! environment variable named after it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{CredentialRepository, SecretProvider, SystemCredential};
use crate::infrastructure::cache::CredentialCache;
use crate::infrastructure::crypto::{CredentialCipher, CryptoError};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Credential service trait
#[async_trait]
pub trait CredentialService: SecretProvider {
    /// Plaintext value of a credential
    async fn get(&self, key: &str) -> Result<String, CredentialError>;

    /// Encrypt and store a credential, replacing any previous value
    async fn set(&self, request: SetCredentialDto) -> Result<SystemCredential, CredentialError>;

    async fn delete(&self, key: &str) -> Result<(), CredentialError>;

    /// Stored credentials without their values
    async fn list(&self) -> Result<Vec<SystemCredential>, CredentialError>;
}

/// Store credential request
#[derive(Debug, Clone)]
pub struct SetCredentialDto {
    pub key: String,
    pub value: String,
    pub category: String,
    pub description: Option<String>,
}

/// Credential service errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential {0} is not configured")]
    NotFound(String),

    #[error("Invalid credential key")]
    InvalidKey,

    #[error("Credential store is locked: {0}")]
    Locked(String),

    #[error("Credential {0} could not be decrypted")]
    Undecryptable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// CredentialService implementation
pub struct CredentialServiceImpl<R>
where
    R: CredentialRepository,
{
    credential_repo: Arc<R>,
    cache: Arc<CredentialCache>,
    /// `None` when the master key is not available
    cipher: Option<CredentialCipher>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R> CredentialServiceImpl<R>
where
    R: CredentialRepository,
{
    pub fn new(
        credential_repo: Arc<R>,
        cache: Arc<CredentialCache>,
        cipher: Option<CredentialCipher>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            credential_repo,
            cache,
            cipher,
            id_generator,
        }
    }

    /// Whether stored credentials can be read and written.
    pub fn is_unlocked(&self) -> bool {
        self.cipher.is_some()
    }

    fn cipher(&self) -> Result<&CredentialCipher, CredentialError> {
        self.cipher
            .as_ref()
            .ok_or_else(|| CredentialError::Locked("master key is not configured".into()))
    }

    fn from_env(key: &str) -> Option<String> {
        std::env::var(SystemCredential::env_fallback_name(key))
            .ok()
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl<R> CredentialService for CredentialServiceImpl<R>
where
    R: CredentialRepository + 'static,
{
    async fn get(&self, key: &str) -> Result<String, CredentialError> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value);
        }

        // A `set` racing this read must not leave our older value cached.
        let generation = self.cache.generation();
        let stored = self
            .credential_repo
            .find_by_key(key)
            .await
            .map_err(|e| CredentialError::Internal(e.to_string()))?;

        let Some(credential) = stored else {
            return Self::from_env(key).ok_or_else(|| CredentialError::NotFound(key.to_string()));
        };

        let value = self
            .cipher()?
            .decrypt(key, &credential.ciphertext, &credential.nonce)
            .map_err(|e| {
                tracing::error!(key, "Failed to decrypt credential: {}", e);
                CredentialError::Undecryptable(key.to_string())
            })?;

        self.cache.insert_if_current(key, value.clone(), generation);
        Ok(value)
    }

    #[tracing::instrument(skip(self, request), fields(key = %request.key))]
    async fn set(&self, request: SetCredentialDto) -> Result<SystemCredential, CredentialError> {
        if !SystemCredential::is_valid_key(&request.key) {
            return Err(CredentialError::InvalidKey);
        }

        let sealed = self
            .cipher()?
            .encrypt(&request.key, &request.value)
            .map_err(|e: CryptoError| CredentialError::Internal(e.to_string()))?;

        let now = Utc::now();
        let credential = SystemCredential {
            id: self.id_generator.generate(),
            key: request.key,
            category: request.category,
            description: request.description,
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .credential_repo
            .upsert(&credential)
            .await
            .map_err(|e| CredentialError::Internal(e.to_string()))?;

        self.cache.invalidate(&stored.key);
        tracing::info!("Credential stored");
        Ok(stored)
    }

    async fn delete(&self, key: &str) -> Result<(), CredentialError> {
        let deleted = self
            .credential_repo
            .delete(key)
            .await
            .map_err(|e| CredentialError::Internal(e.to_string()))?;

        self.cache.invalidate(key);
        if !deleted {
            return Err(CredentialError::NotFound(key.to_string()));
        }
        tracing::info!(key, "Credential deleted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SystemCredential>, CredentialError> {
        self.credential_repo
            .list()
            .await
            .map_err(|e| CredentialError::Internal(e.to_string()))
    }
}

#[async_trait]
impl<R> SecretProvider for CredentialServiceImpl<R>
where
    R: CredentialRepository + 'static,
{
    async fn secret(&self, key: &str) -> Result<String, AppError> {
        self.get(key).await.map_err(|e| match e {
            CredentialError::NotFound(key) => AppError::NotFound(format!("Credential {}", key)),
            other => AppError::Internal(other.to_string()),
        })
    }
}
