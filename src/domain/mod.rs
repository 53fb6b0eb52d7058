//! # Domain Layer
//!
//! The domain layer contains the core business rules of the store.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (Product, Order, Subscription, etc.)
//! - **value_objects**: Lifecycle state machines, payment events, money helpers
//! - **services**: Domain services (pricing)
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
pub use value_objects::*;
