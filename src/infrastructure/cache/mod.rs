//! Cache Module
//!
//! In-process caches. Decrypted credentials are kept in a concurrent map
//! with per-entry expiry so the database and cipher are not hit on every
//! gateway call.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use storefront::infrastructure::cache::CredentialCache;
//!
//! let cache = CredentialCache::new(Duration::from_secs(300));
//! cache.insert("stripe.secret_key", secret);
//! let secret = cache.get("stripe.secret_key");
//! ```

mod credential_cache;

pub use credential_cache::CredentialCache;
