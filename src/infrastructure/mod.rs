//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - In-process credential cache and AES-GCM cipher
//! - Stripe and PayPal REST clients
//! - Outbound mail and filesystem storage
//! - Prometheus metrics

pub mod cache;
pub mod crypto;
pub mod database;
pub mod email;
pub mod metrics;
pub mod payments;
pub mod repositories;
pub mod storage;
