//! # Storefront Library
//!
//! This crate provides an online store and content library with:
//! - RESTful HTTP API for catalog, cart, checkout, orders and subscriptions
//! - Stripe and PayPal checkout with signed webhook reconciliation
//! - Digital delivery through expiring, count-limited download tokens
//! - An AES-GCM encrypted credential store for gateway and mail secrets
//! - Document, gallery and link libraries
//! - PostgreSQL for persistent storage
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core business entities, state machines, pricing and repository traits
//! - **Application Layer**: Business logic services and DTOs
//! - **Infrastructure Layer**: Database, gateways, crypto, mail and file storage
//! - **Presentation Layer**: HTTP handlers, extractors and middleware
//!
//! ## Module Structure
//!
//! ```text
//! storefront/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Database, gateway and storage implementations
//! +-- presentation/   HTTP routes and middleware
//! +-- shared/         Common utilities (errors, snowflake IDs, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
