//! Account Handlers

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Extension, Json,
};

use crate::application::dto::request::{LoginRequest, RegisterRequest};
use crate::application::dto::response::{AuthResponse, ProfileResponse};
use crate::application::services::{AuthError, AuthService, CartService};
use crate::presentation::http::extractors::{is_valid_cart_token, CART_TOKEN_HEADER};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn map_auth_error(e: AuthError) -> AppError {
    match e {
        AuthError::InvalidCredentials => AppError::Unauthorized("Invalid email or password".into()),
        AuthError::TokenExpired => AppError::Unauthorized("Token expired".into()),
        AuthError::InvalidToken => AppError::Unauthorized("Invalid token".into()),
        AuthError::UserNotFound => AppError::NotFound("User not found".into()),
        AuthError::EmailExists => AppError::Conflict("Email already exists".into()),
        AuthError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Move the visitor's guest cart into their account. Failures only cost the
/// guest cart, so they are logged rather than failing the sign-in.
async fn merge_guest_cart(state: &AppState, token: Option<&str>, user_id: i64) {
    let Some(token) = token.filter(|t| is_valid_cart_token(t)) else {
        return;
    };

    if let Err(e) = state.cart_service().merge(token, user_id).await {
        tracing::warn!(user_id, "Guest cart merge failed: {}", e);
    }
}

fn header_cart_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(CART_TOKEN_HEADER).and_then(|v| v.to_str().ok())
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    validate(&body)?;

    let (user, tokens) = state
        .auth_service()
        .register(&body.email, &body.password, body.display_name.clone())
        .await
        .map_err(map_auth_error)?;

    let cart_token = body.cart_token.as_deref().or_else(|| header_cart_token(&headers));
    merge_guest_cart(&state, cart_token, user.id).await;

    Ok((StatusCode::CREATED, Json(AuthResponse::new(user, tokens))))
}

/// Sign in with email and password
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    validate(&body)?;

    let (user, tokens) = state
        .auth_service()
        .authenticate(&body.email, &body.password)
        .await
        .map_err(map_auth_error)?;

    merge_guest_cart(&state, header_cart_token(&headers), user.id).await;

    Ok(Json(AuthResponse::new(user, tokens)))
}

/// Current account profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .auth_service()
        .profile(auth.user_id)
        .await
        .map_err(map_auth_error)?;

    Ok(Json(profile))
}
