//! # Domain Entities
//!
//! Core domain entities representing the main business objects of the store.
//! All entities map directly to their corresponding database tables.
//!
//! ## Commerce
//!
//! - **User**: customer or admin account
//! - **Product**: catalog item (physical, digital or subscription)
//! - **ShoppingCart / CartItem**: pre-checkout selection
//! - **Order / OrderItem**: purchase record with price snapshots
//! - **Subscription / SubscriptionPayment**: recurring billing
//! - **CustomerDownload**: download grant for purchased digital goods
//!
//! ## Content & configuration
//!
//! - **Document**, **GalleryImage**, **Link**: content libraries
//! - **SystemCredential**: encrypted secret
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer.

mod cart;
mod credential;
mod document;
mod download;
mod gallery;
mod link;
mod order;
mod product;
mod subscription;
mod user;
mod webhook_event;

pub use cart::{CartItem, CartOwner, CartRepository, ShoppingCart};
pub use credential::{
    keys as credential_keys, CredentialRepository, SecretProvider, SystemCredential,
};
pub use document::{Document, DocumentRepository};
pub use download::{CustomerDownload, DownloadRepository, DOWNLOAD_TOKEN_LEN};
pub use gallery::{AlbumSummary, GalleryImage, GalleryRepository};
pub use link::{Link, LinkRepository};
pub use order::{paid_status_for, Order, OrderItem, OrderRepository, ShippingAddress};
pub use product::{BillingInterval, Product, ProductKind, ProductRepository};
pub use subscription::{ChargeStatus, Subscription, SubscriptionPayment, SubscriptionRepository};
pub use user::{User, UserRepository, UserRole};
pub use webhook_event::WebhookEventRepository;

#[cfg(test)]
pub use download::MockDownloadRepository;
#[cfg(test)]
pub use product::MockProductRepository;
