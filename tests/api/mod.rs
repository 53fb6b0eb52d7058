//! REST API tests against the real router.

mod auth_tests;
mod health_tests;
mod webhook_tests;
