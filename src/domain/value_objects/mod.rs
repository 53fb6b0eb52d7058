//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **Lifecycle**: order and subscription status machines, payment providers
//! - **Money**: cent arithmetic and decimal string conversion
//! - **PaymentEvent**: gateway-neutral webhook meaning

mod lifecycle;
pub mod money;
mod payment_event;

pub use lifecycle::*;
pub use payment_event::*;
