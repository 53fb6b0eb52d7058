//! Authentication Service
//!
//! Handles account registration, login, JWT access tokens and the
//! current-account profile.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtSettings;
use crate::domain::{SubscriptionRepository, User, UserRepository, UserRole};
use crate::shared::snowflake::SnowflakeGenerator;

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new account
    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<(User, AuthTokens), AuthError>;

    /// Authenticate with email and password
    async fn authenticate(&self, email: &str, password: &str) -> Result<(User, AuthTokens), AuthError>;

    /// Profile of the signed-in account
    async fn profile(&self, user_id: i64) -> Result<ProfileDto, AuthError>;
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Account role ("customer" | "admin")
    pub role: UserRole,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
}

/// Account profile with membership flag
#[derive(Debug, Clone, Serialize)]
pub struct ProfileDto {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub is_member: bool,
    pub created_at: String,
}

impl ProfileDto {
    pub fn from_user(user: User, is_member: bool) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_member,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists")]
    EmailExists,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Decode and validate an access token.
pub fn decode_access_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// AuthService implementation
pub struct AuthServiceImpl<U, S>
where
    U: UserRepository,
    S: SubscriptionRepository,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    id_generator: Arc<SnowflakeGenerator>,
    jwt_settings: JwtSettings,
    admin_emails: Vec<String>,
}

impl<U, S> AuthServiceImpl<U, S>
where
    U: UserRepository,
    S: SubscriptionRepository,
{
    /// Create a new AuthServiceImpl
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        id_generator: Arc<SnowflakeGenerator>,
        jwt_settings: JwtSettings,
        admin_emails: Vec<String>,
    ) -> Self {
        Self {
            user_repo,
            subscription_repo,
            id_generator,
            jwt_settings,
            admin_emails,
        }
    }

    /// Hash a password using Argon2id
    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Generate an access token carrying the user id and role
    fn generate_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        let now = Utc::now();
        let expiry = now + Duration::minutes(self.jwt_settings.access_token_expiry_minutes);

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            exp: expiry.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_settings.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AuthTokens {
            access_token,
            expires_in: self.jwt_settings.access_token_expiry_minutes * 60,
            token_type: "Bearer".to_string(),
        })
    }

    fn role_for(&self, email: &str) -> UserRole {
        if self
            .admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
        {
            UserRole::Admin
        } else {
            UserRole::Customer
        }
    }
}

#[async_trait]
impl<U, S> AuthService for AuthServiceImpl<U, S>
where
    U: UserRepository + 'static,
    S: SubscriptionRepository + 'static,
{
    #[tracing::instrument(skip(self, password, display_name))]
    async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<(User, AuthTokens), AuthError> {
        let email = email.trim().to_lowercase();

        if self
            .user_repo
            .email_exists(&email)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
        {
            return Err(AuthError::EmailExists);
        }

        let password_hash = self.hash_password(password)?;

        let now = Utc::now();
        let user = User {
            id: self.id_generator.generate(),
            role: self.role_for(&email),
            email,
            password_hash,
            display_name,
            created_at: now,
            updated_at: now,
        };

        let created_user = self.user_repo.create(&user).await.map_err(|e| match e {
            crate::shared::error::AppError::Conflict(_) => AuthError::EmailExists,
            e => AuthError::Internal(e.to_string()),
        })?;

        if created_user.is_admin() {
            tracing::info!(user_id = created_user.id, "Registered store administrator");
        }

        let tokens = self.generate_tokens(&created_user)?;
        Ok((created_user, tokens))
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<(User, AuthTokens), AuthError> {
        let user = self
            .user_repo
            .find_by_email(&email.trim().to_lowercase())
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.generate_tokens(&user)?;
        Ok((user, tokens))
    }

    async fn profile(&self, user_id: i64) -> Result<ProfileDto, AuthError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        let is_member = self
            .subscription_repo
            .has_active(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(ProfileDto::from_user(user, is_member))
    }
}
