//! Application Startup
//!
//! Application building, shared state and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;

use crate::application::services::{
    AuthServiceImpl, CartServiceImpl, CatalogServiceImpl, CheckoutServiceImpl, CheckoutUrls,
    CredentialServiceImpl, DocumentServiceImpl, DownloadServiceImpl, FulfilmentSettings,
    GalleryServiceImpl, LinkServiceImpl, MaintenanceService, OrderServiceImpl,
    ReconciliationServiceImpl, SubscriptionServiceImpl,
};
use crate::config::Settings;
use crate::domain::{PricingRules, SecretProvider};
use crate::infrastructure::cache::CredentialCache;
use crate::infrastructure::crypto::{CredentialCipher, CryptoError};
use crate::infrastructure::database;
use crate::infrastructure::email::{build_mailer, Mailer};
use crate::infrastructure::payments::{PayPalGateway, PaymentGateways, StripeGateway};
use crate::infrastructure::repositories::{
    PgCartRepository, PgCredentialRepository, PgDocumentRepository, PgDownloadRepository,
    PgGalleryRepository, PgLinkRepository, PgOrderRepository, PgProductRepository,
    PgSubscriptionRepository, PgUserRepository, PgWebhookEventRepository,
};
use crate::infrastructure::storage::FileStore;
use crate::presentation::http::{handlers::health, routes};
use crate::presentation::middleware::{cors, logging};
use crate::shared::snowflake::SnowflakeGenerator;

/// Credential service backed by Postgres
pub type Credentials = CredentialServiceImpl<PgCredentialRepository>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Arc<Settings>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub credentials: Arc<Credentials>,
    pub credential_cache: Arc<CredentialCache>,
    pub gateways: PaymentGateways,
    pub mailer: Arc<dyn Mailer>,
    pub files: FileStore,
}

impl AppState {
    /// Wire shared components. Does not touch the database.
    pub fn new(db: PgPool, settings: Settings) -> Result<Self> {
        let snowflake = Arc::new(SnowflakeGenerator::new(
            settings.snowflake.machine_id as u64,
            settings.snowflake.epoch,
        ));

        let cipher = match CredentialCipher::from_env(&settings.credentials.master_key_env) {
            Ok(cipher) => Some(cipher),
            Err(CryptoError::MissingKey(var)) => {
                tracing::warn!(
                    "{} is not set; stored credentials are unavailable and environment fallbacks are used",
                    var
                );
                None
            }
            Err(e) => return Err(e.into()),
        };

        let credential_cache = Arc::new(CredentialCache::new(Duration::from_secs(
            settings.credentials.cache_ttl_secs,
        )));
        let credentials = Arc::new(CredentialServiceImpl::new(
            Arc::new(PgCredentialRepository::new(db.clone())),
            credential_cache.clone(),
            cipher,
            snowflake.clone(),
        ));
        let secrets: Arc<dyn SecretProvider> = credentials.clone();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.payments.request_timeout_secs))
            .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let gateways = PaymentGateways {
            stripe: Arc::new(StripeGateway::new(
                http.clone(),
                settings.payments.stripe_api_base.clone(),
                settings.payments.webhook_tolerance_secs,
                secrets.clone(),
            )),
            paypal: Arc::new(PayPalGateway::new(
                http.clone(),
                settings.payments.paypal_api_base.clone(),
                secrets.clone(),
            )),
        };

        let mailer = build_mailer(&settings.email, http, secrets);
        let files = FileStore::new(&settings.storage.upload_dir);

        Ok(Self {
            db,
            settings: Arc::new(settings),
            snowflake,
            credentials,
            credential_cache,
            gateways,
            mailer,
            files,
        })
    }

    fn pricing_rules(&self) -> PricingRules {
        PricingRules::from(&self.settings.store)
    }

    fn download_valid_for(&self) -> chrono::Duration {
        chrono::Duration::hours(self.settings.downloads.expiry_hours)
    }

    pub fn auth_service(&self) -> AuthServiceImpl<PgUserRepository, PgSubscriptionRepository> {
        AuthServiceImpl::new(
            Arc::new(PgUserRepository::new(self.db.clone())),
            Arc::new(PgSubscriptionRepository::new(self.db.clone())),
            self.snowflake.clone(),
            self.settings.jwt.clone(),
            self.settings.store.admin_emails.clone(),
        )
    }

    pub fn catalog_service(&self) -> CatalogServiceImpl<PgProductRepository> {
        CatalogServiceImpl::new(
            Arc::new(PgProductRepository::new(self.db.clone())),
            self.snowflake.clone(),
        )
    }

    pub fn cart_service(
        &self,
    ) -> CartServiceImpl<PgCartRepository, PgProductRepository, PgSubscriptionRepository> {
        CartServiceImpl::new(
            Arc::new(PgCartRepository::new(self.db.clone())),
            Arc::new(PgProductRepository::new(self.db.clone())),
            Arc::new(PgSubscriptionRepository::new(self.db.clone())),
            self.snowflake.clone(),
            self.pricing_rules(),
            self.settings.store.currency.clone(),
        )
    }

    pub fn checkout_service(
        &self,
    ) -> CheckoutServiceImpl<
        PgOrderRepository,
        PgCartRepository,
        PgProductRepository,
        PgSubscriptionRepository,
    > {
        CheckoutServiceImpl::new(
            Arc::new(PgOrderRepository::new(self.db.clone())),
            Arc::new(PgCartRepository::new(self.db.clone())),
            Arc::new(PgProductRepository::new(self.db.clone())),
            Arc::new(PgSubscriptionRepository::new(self.db.clone())),
            self.gateways.clone(),
            self.snowflake.clone(),
            self.pricing_rules(),
            self.settings.store.currency.clone(),
            CheckoutUrls {
                public_base_url: self.settings.store.public_base_url.clone(),
            },
        )
    }

    pub fn order_service(&self) -> OrderServiceImpl<PgOrderRepository, PgDownloadRepository> {
        OrderServiceImpl::new(
            Arc::new(PgOrderRepository::new(self.db.clone())),
            Arc::new(PgDownloadRepository::new(self.db.clone())),
            self.settings.store.public_base_url.clone(),
        )
    }

    pub fn reconciliation_service(
        &self,
    ) -> ReconciliationServiceImpl<
        PgOrderRepository,
        PgSubscriptionRepository,
        PgWebhookEventRepository,
    > {
        ReconciliationServiceImpl::new(
            Arc::new(PgOrderRepository::new(self.db.clone())),
            Arc::new(PgSubscriptionRepository::new(self.db.clone())),
            Arc::new(PgWebhookEventRepository::new(self.db.clone())),
            self.mailer.clone(),
            self.snowflake.clone(),
            FulfilmentSettings {
                store_name: self.settings.store.name.clone(),
                public_base_url: self.settings.store.public_base_url.clone(),
                max_downloads: self.settings.downloads.max_downloads,
                download_valid_for: self.download_valid_for(),
            },
        )
    }

    pub fn subscription_service(
        &self,
    ) -> SubscriptionServiceImpl<PgSubscriptionRepository, PgProductRepository, PgUserRepository>
    {
        SubscriptionServiceImpl::new(
            Arc::new(PgSubscriptionRepository::new(self.db.clone())),
            Arc::new(PgProductRepository::new(self.db.clone())),
            Arc::new(PgUserRepository::new(self.db.clone())),
            self.gateways.clone(),
            self.settings.store.public_base_url.clone(),
        )
    }

    pub fn download_service(&self) -> DownloadServiceImpl<PgDownloadRepository, PgProductRepository> {
        DownloadServiceImpl::new(
            Arc::new(PgDownloadRepository::new(self.db.clone())),
            Arc::new(PgProductRepository::new(self.db.clone())),
            self.download_valid_for(),
            self.settings.store.public_base_url.clone(),
        )
    }

    pub fn document_service(&self) -> DocumentServiceImpl<PgDocumentRepository> {
        DocumentServiceImpl::new(
            Arc::new(PgDocumentRepository::new(self.db.clone())),
            self.files.clone(),
            self.snowflake.clone(),
        )
    }

    pub fn gallery_service(&self) -> GalleryServiceImpl<PgGalleryRepository> {
        GalleryServiceImpl::new(
            Arc::new(PgGalleryRepository::new(self.db.clone())),
            self.files.clone(),
            self.snowflake.clone(),
        )
    }

    pub fn link_service(&self) -> LinkServiceImpl<PgLinkRepository> {
        LinkServiceImpl::new(
            Arc::new(PgLinkRepository::new(self.db.clone())),
            self.snowflake.clone(),
        )
    }

    pub fn maintenance_service(&self) -> MaintenanceService {
        MaintenanceService::new(
            Arc::new(self.subscription_service()),
            Arc::new(self.download_service()),
            self.credential_cache.clone(),
            chrono::Duration::days(self.settings.maintenance.past_due_grace_days),
        )
    }
}

/// Build the full router with middleware layers
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state).layer(
        ServiceBuilder::new()
            .layer(logging::create_trace_layer())
            .layer(CompressionLayer::new())
            .layer(cors),
    )
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await?;
            tracing::info!("Database migrations applied");
        }

        tokio::fs::create_dir_all(&settings.storage.upload_dir).await?;

        let addr: SocketAddr = settings.server_addr().parse()?;
        let state = AppState::new(db, settings)?;
        let router = build_router(state.clone());

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            state,
        })
    }

    /// Run the server until Ctrl-C / SIGTERM
    pub async fn run_until_stopped(self) -> Result<()> {
        spawn_maintenance(self.state.clone());

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// Run maintenance on a fixed interval for the life of the process.
fn spawn_maintenance(state: AppState) {
    let period = Duration::from_secs(state.settings.maintenance.interval_secs.max(60));
    tokio::spawn(async move {
        let maintenance = state.maintenance_service();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            maintenance.run_once().await;
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
