//! Authentication Middleware
//!
//! JWT validation middleware for protected and admin routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::application::services::{decode_access_token, AuthError};
use crate::domain::UserRole;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Authenticated user extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_owned())
}

fn authenticate(secret: &str, token: &str) -> Result<AuthUser, AppError> {
    let claims = decode_access_token(secret, token).map_err(|e| match e {
        AuthError::TokenExpired => AppError::Unauthorized("Token expired".into()),
        _ => AppError::Unauthorized("Invalid token".into()),
    })?;

    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token claims".into()))?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
    })
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if request.headers().get(AUTHORIZATION).is_none() {
        return Err(AppError::Unauthorized("Missing authorization header".into()));
    }

    let token = bearer_token(&request)
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?;
    let user = authenticate(&state.settings.jwt.secret, &token)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Optional authentication middleware (doesn't fail if no token)
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = bearer_token(&request)
        .and_then(|token| authenticate(&state.settings.jwt.secret, &token).ok());

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

/// Rejects requests whose authenticated user is not an admin.
/// Must run after `auth_middleware`.
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .map(AuthUser::is_admin)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;

    if !is_admin {
        return Err(AppError::Forbidden("Administrator access required".into()));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_token_is_unauthorized() {
        let err = authenticate("a-secret-that-is-long-enough-for-tests", "not.a.jwt").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_admin_role() {
        let user = AuthUser {
            user_id: 1,
            role: UserRole::Admin,
        };
        assert!(user.is_admin());

        let user = AuthUser {
            user_id: 2,
            role: UserRole::Customer,
        };
        assert!(!user.is_admin());
    }
}
