//! CORS Middleware Configuration
//!
//! Storefront browsers send the bearer token and the guest cart header, so
//! both must be allowed cross-origin.

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsSettings;
use crate::presentation::http::extractors::CART_TOKEN_HEADER;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

fn allowed_origins(settings: &CorsSettings) -> Vec<HeaderValue> {
    settings
        .allowed_origins
        .iter()
        .filter(|o| o.as_str() != "*")
        .filter_map(|o| o.parse().ok())
        .collect()
}

/// Create CORS layer from settings. No usable origin (or `*`) allows any origin.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins = allowed_origins(settings);
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };
    let cart_header = HeaderName::from_static(CART_TOKEN_HEADER);

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, cart_header.clone()])
        .expose_headers([cart_header])
        .max_age(PREFLIGHT_MAX_AGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(origins: &[&str]) -> CorsSettings {
        CorsSettings {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn test_wildcard_is_not_a_listed_origin() {
        assert!(allowed_origins(&settings(&["*"])).is_empty());
    }

    #[test]
    fn test_listed_origins_are_parsed() {
        let origins = allowed_origins(&settings(&["https://shop.example", "http://localhost:3000"]));
        assert_eq!(origins.len(), 2);
        assert_eq!(origins[0], "https://shop.example");
    }
}
