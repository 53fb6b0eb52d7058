//! Credential Store Handlers
//!
//! Admin-only. Values go in, metadata comes out; plaintext is never returned.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::SetCredentialRequest;
use crate::application::dto::response::ActionResponse;
use crate::application::services::{CredentialError, CredentialService, SetCredentialDto};
use crate::domain::SystemCredential;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

fn map_credential_error(e: CredentialError) -> AppError {
    match e {
        CredentialError::NotFound(key) => {
            AppError::NotFound(format!("Credential {} is not configured", key))
        }
        CredentialError::InvalidKey => AppError::Validation(
            "key: use dot-separated lowercase letters, digits or '_'".into(),
        ),
        CredentialError::Locked(msg) => AppError::Conflict(format!(
            "Credential store is locked: {}",
            msg
        )),
        CredentialError::Undecryptable(key) => {
            AppError::Internal(format!("Credential {} could not be decrypted", key))
        }
        CredentialError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Stored credentials (metadata only)
pub async fn list_credentials(
    State(state): State<AppState>,
) -> Result<Json<Vec<SystemCredential>>, AppError> {
    let credentials = state
        .credentials
        .list()
        .await
        .map_err(map_credential_error)?;

    Ok(Json(credentials))
}

/// Store or replace a credential
pub async fn set_credential(
    State(state): State<AppState>,
    Json(body): Json<SetCredentialRequest>,
) -> Result<(StatusCode, Json<SystemCredential>), AppError> {
    validate(&body)?;

    let credential = state
        .credentials
        .set(SetCredentialDto {
            key: body.key,
            value: body.value,
            category: body.category,
            description: body.description,
        })
        .await
        .map_err(map_credential_error)?;

    tracing::info!(key = %credential.key, "Credential stored");
    Ok((StatusCode::CREATED, Json(credential)))
}

pub async fn delete_credential(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    state
        .credentials
        .delete(&key)
        .await
        .map_err(map_credential_error)?;

    tracing::info!(key = %key, "Credential deleted");
    Ok(Json(ActionResponse::ok("Credential deleted")))
}

/// Drop every cached plaintext so the next read goes to the database
pub async fn flush_cache(State(state): State<AppState>) -> Json<ActionResponse> {
    state.credential_cache.clear();
    Json(ActionResponse::ok("Credential cache cleared"))
}
