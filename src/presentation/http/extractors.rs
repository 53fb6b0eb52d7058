//! Custom Extractors
//!
//! Axum extractors for cart ownership and request parsing.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::domain::CartOwner;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;

/// Header carrying the guest cart token
pub const CART_TOKEN_HEADER: &str = "x-cart-token";

const MAX_CART_TOKEN_LEN: usize = 64;

/// Owner of the cart a request operates on.
///
/// A signed-in user (set by `optional_auth_middleware`) owns their account
/// cart. Guests are identified by `X-Cart-Token`; a guest without one gets
/// a fresh token, returned to them in the cart body.
#[derive(Debug, Clone)]
pub struct CartSession(pub CartOwner);

pub fn is_valid_cart_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_CART_TOKEN_LEN
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

pub fn new_cart_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Signed-in user when `optional_auth_middleware` found a valid token
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(AuthUser::is_admin)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<AuthUser>().cloned()))
    }
}

impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(CartSession(CartOwner::User(user.user_id)));
        }

        let header = parts
            .headers
            .get(CART_TOKEN_HEADER)
            .map(|v| v.to_str().map(str::trim));

        match header {
            Some(Ok(token)) if is_valid_cart_token(token) => {
                Ok(CartSession(CartOwner::Guest(token.to_string())))
            }
            Some(_) => Err(AppError::BadRequest("Invalid cart token".into())),
            None => Ok(CartSession(CartOwner::Guest(new_cart_token()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("abc123", true ; "alphanumeric")]
    #[test_case("0b7c-44aa", true ; "with dashes")]
    #[test_case("", false ; "empty")]
    #[test_case("has space", false ; "whitespace")]
    #[test_case("../etc/passwd", false ; "path characters")]
    fn test_cart_token_validation(token: &str, expected: bool) {
        assert_eq!(is_valid_cart_token(token), expected);
    }

    #[test]
    fn test_overlong_token_rejected() {
        assert!(!is_valid_cart_token(&"a".repeat(65)));
        assert!(is_valid_cart_token(&new_cart_token()));
    }
}
