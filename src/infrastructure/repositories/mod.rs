//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! This module provides concrete implementations of the repository traits
//! defined in the domain layer. Each repository handles data access for
//! a specific entity type.
//!
//! ## Available Repositories
//!
//! - **UserRepository** - customer and admin accounts
//! - **ProductRepository** - catalog and stock
//! - **CartRepository** - guest and customer carts
//! - **OrderRepository** - orders, items and transactional placement
//! - **SubscriptionRepository** - recurring billing and charges
//! - **DownloadRepository** - digital delivery grants
//! - **WebhookEventRepository** - processed webhook ledger
//! - **CredentialRepository** - encrypted secrets
//! - **DocumentRepository**, **GalleryRepository**, **LinkRepository** - content
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgOrderRepository, PgProductRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let product_repo = PgProductRepository::new(pool.clone());
//!     let order_repo = PgOrderRepository::new(pool.clone());
//! }
//! ```

pub mod cart_repository;
pub mod credential_repository;
pub mod document_repository;
pub mod download_repository;
pub mod gallery_repository;
pub mod link_repository;
pub mod order_repository;
pub mod product_repository;
pub mod subscription_repository;
pub mod user_repository;
pub mod webhook_event_repository;

pub use cart_repository::PgCartRepository;
pub use credential_repository::PgCredentialRepository;
pub use document_repository::PgDocumentRepository;
pub use download_repository::PgDownloadRepository;
pub use gallery_repository::PgGalleryRepository;
pub use link_repository::PgLinkRepository;
pub use order_repository::PgOrderRepository;
pub use product_repository::PgProductRepository;
pub use subscription_repository::PgSubscriptionRepository;
pub use user_repository::PgUserRepository;
pub use webhook_event_repository::PgWebhookEventRepository;
