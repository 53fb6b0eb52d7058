//! Integration Tests Entry Point
//!
//! Tests are organized by module:
//! - `api/` - HTTP tests against the real router (no database reachable)
//! - `services/` - checkout, reconciliation and download flows over in-memory repositories
//! - `common/` - Shared test utilities and fakes

mod api;
mod common;
mod services;
