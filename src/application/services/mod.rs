//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, login, JWT access tokens, profile
//! - **CatalogService**: Product browsing and admin product management
//! - **CartService**: Guest and customer carts with member pricing
//! - **CheckoutService**: Order placement and gateway hand-off
//! - **OrderService**: Order history and fulfilment
//! - **ReconciliationService**: Payment webhook processing
//! - **SubscriptionService**: Recurring billing and membership
//! - **DownloadService**: Digital delivery tokens
//! - **CredentialService**: Encrypted secret storage
//! - **DocumentService**, **GalleryService**, **LinkService**: Content libraries
//! - **MaintenanceService**: Periodic housekeeping

pub mod auth_service;
pub mod cart_service;
pub mod catalog_service;
pub mod checkout_service;
pub mod credential_service;
pub mod document_service;
pub mod download_service;
pub mod gallery_service;
pub mod link_service;
pub mod maintenance_service;
pub mod order_service;
pub mod reconciliation_service;
pub mod subscription_service;

pub use auth_service::{
    decode_access_token, AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims, ProfileDto,
};
pub use cart_service::{CartError, CartLineDto, CartService, CartServiceImpl, CartView};
pub use catalog_service::{
    CatalogError, CatalogService, CatalogServiceImpl, CreateProductDto, UpdateProductDto,
};
pub use checkout_service::{
    CheckoutError, CheckoutResultDto, CheckoutService, CheckoutServiceImpl, CheckoutUrls,
    PlaceOrderDto,
};
pub use credential_service::{
    CredentialError, CredentialService, CredentialServiceImpl, SetCredentialDto,
};
pub use document_service::{
    DocumentError, DocumentService, DocumentServiceImpl, UpdateDocumentDto, UploadDocumentDto,
};
pub use download_service::{
    DownloadDto, DownloadError, DownloadService, DownloadServiceImpl, RedeemedDownload,
};
pub use gallery_service::{GalleryError, GalleryService, GalleryServiceImpl, UploadImageDto};
pub use link_service::{LinkCategoryDto, LinkError, LinkInputDto, LinkService, LinkServiceImpl};
pub use maintenance_service::{MaintenanceReport, MaintenanceService};
pub use order_service::{OrderDetailDto, OrderError, OrderService, OrderServiceImpl};
pub use reconciliation_service::{
    FulfilmentSettings, ReconcileError, ReconciliationService, ReconciliationServiceImpl,
};
pub use subscription_service::{
    SubscriptionDetailDto, SubscriptionError, SubscriptionService, SubscriptionServiceImpl,
};
