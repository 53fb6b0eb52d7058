//! # Domain Services
//!
//! Domain services encapsulate business logic that doesn't naturally
//! belong to a single entity.
//!
//! ## Services
//!
//! - **PricingService**: cart and order totals (member prices, shipping, tax)

mod pricing_service;

pub use pricing_service::*;
