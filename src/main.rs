//! # Storefront
//!
//! Storefront and content library service.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool and migrations
//! - Payment gateway clients and the credential store
//! - HTTP server and the background maintenance task

use anyhow::Result;
use tracing::info;

use storefront::config::Settings;
use storefront::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing subscriber for structured logging
    storefront::telemetry::init_tracing();

    info!("Starting Storefront...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        currency = %settings.store.currency,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
