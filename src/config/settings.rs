//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// JWT authentication settings
    pub jwt: JwtSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Store pricing and identity
    pub store: StoreSettings,

    /// Digital delivery limits
    pub downloads: DownloadSettings,

    /// Encrypted credential store
    pub credentials: CredentialSettings,

    /// Uploaded file storage
    pub storage: StorageSettings,

    /// Payment gateway endpoints
    pub payments: PaymentSettings,

    /// Outbound email
    pub email: EmailSettings,

    /// Background maintenance
    pub maintenance: MaintenanceSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Run embedded migrations at startup
    pub run_migrations: bool,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens
    pub secret: String,

    /// Access token expiry in minutes
    pub access_token_expiry_minutes: i64,
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine/worker ID (0-1023)
    pub machine_id: u16,

    /// Custom epoch timestamp in milliseconds
    pub epoch: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins
    pub allowed_origins: Vec<String>,
}

/// Store-wide pricing rules and identity.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// Display name used in emails and gateway checkout pages
    pub name: String,

    /// ISO 4217 currency code for every price
    pub currency: String,

    /// Sales tax in basis points (825 = 8.25%)
    pub tax_rate_bps: u32,

    /// Flat shipping charge applied to carts with physical items
    pub flat_shipping_cents: i64,

    /// Subtotal at or above which shipping is free (0 disables)
    pub free_shipping_threshold_cents: i64,

    /// Public base URL used for gateway return links and download links
    pub public_base_url: String,

    /// Emails that register with the admin role
    pub admin_emails: Vec<String>,
}

/// Digital delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    /// Downloads allowed per token
    pub max_downloads: i32,

    /// Hours a token stays valid after issue
    pub expiry_hours: i64,
}

/// Credential store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSettings {
    /// Seconds a decrypted credential stays cached
    pub cache_ttl_secs: u64,

    /// Name of the env var holding the hex-encoded 32-byte master key
    pub master_key_env: String,
}

/// Filesystem storage for uploaded documents and images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Root directory for uploaded files
    pub upload_dir: String,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

/// Payment gateway configuration. Secrets live in the credential store.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentSettings {
    /// Stripe REST API base URL
    pub stripe_api_base: String,

    /// PayPal REST API base URL (sandbox or live)
    pub paypal_api_base: String,

    /// Maximum accepted age of a Stripe webhook signature in seconds
    pub webhook_tolerance_secs: i64,

    /// Gateway HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

/// Outbound email configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    /// "log" writes messages to the trace log, "http" posts them to `endpoint`
    pub provider: String,

    /// HTTP mail API endpoint
    pub endpoint: Option<String>,

    /// Sender address
    pub sender: String,
}

/// Background maintenance configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceSettings {
    /// Seconds between maintenance sweeps
    pub interval_secs: u64,

    /// Days a past-due subscription is kept before it expires
    pub past_due_grace_days: i64,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if JWT secret is too short.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::defaults(Config::builder(), &environment)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__STORE__CURRENCY=EUR -> store.currency = "EUR"
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option(
                "snowflake.machine_id",
                std::env::var("SNOWFLAKE_MACHINE_ID").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validated())
    }

    /// Apply built-in defaults for every optional key.
    pub fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("jwt.access_token_expiry_minutes", 60)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.epoch", 1704067200000_u64)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("store.name", "Storefront")?
            .set_default("store.currency", "USD")?
            .set_default("store.tax_rate_bps", 0)?
            .set_default("store.flat_shipping_cents", 599)?
            .set_default("store.free_shipping_threshold_cents", 7500)?
            .set_default("store.public_base_url", "http://localhost:3000")?
            .set_default("store.admin_emails", Vec::<String>::new())?
            .set_default("downloads.max_downloads", 5)?
            .set_default("downloads.expiry_hours", 72)?
            .set_default("credentials.cache_ttl_secs", 300)?
            .set_default("credentials.master_key_env", "STORE_MASTER_KEY")?
            .set_default("storage.upload_dir", "./uploads")?
            .set_default("storage.max_upload_bytes", 25 * 1024 * 1024)?
            .set_default("payments.stripe_api_base", "https://api.stripe.com")?
            .set_default("payments.paypal_api_base", "https://api-m.sandbox.paypal.com")?
            .set_default("payments.webhook_tolerance_secs", 300)?
            .set_default("payments.request_timeout_secs", 20)?
            .set_default("email.provider", "log")?
            .set_default("email.sender", "store@localhost")?
            .set_default("maintenance.interval_secs", 3600)?
            .set_default("maintenance.past_due_grace_days", 14)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.store.currency.len() != 3 {
            return Err(ConfigError::Message(format!(
                "store.currency must be a 3-letter ISO code, got '{}'",
                self.store.currency
            )));
        }
        if self.downloads.max_downloads < 1 {
            return Err(ConfigError::Message(
                "downloads.max_downloads must be at least 1".into(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl StoreSettings {
    /// Whether a newly registered email gets the admin role.
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(overrides: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let mut builder = Settings::defaults(Config::builder(), "test")?
            .set_override("database.url", "postgres://localhost/store_test")?
            .set_override("jwt.secret", "0123456789abcdef0123456789abcdef")?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize::<Settings>()?.validated()
    }

    #[test]
    fn test_defaults_deserialize() {
        let settings = build(&[]).unwrap();
        assert_eq!(settings.store.currency, "USD");
        assert_eq!(settings.downloads.max_downloads, 5);
        assert_eq!(settings.credentials.master_key_env, "STORE_MASTER_KEY");
        assert_eq!(settings.server_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        assert!(build(&[("jwt.secret", "short")]).is_err());
    }

    #[test]
    fn test_admin_email_match_is_case_insensitive() {
        let mut settings = build(&[]).unwrap();
        settings.store.admin_emails = vec!["Owner@Shop.test".into()];
        assert!(settings.store.is_admin_email("owner@shop.test"));
        assert!(!settings.store.is_admin_email("guest@shop.test"));
    }
}
