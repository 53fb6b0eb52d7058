//! Digital Delivery Handlers

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};

use crate::application::dto::response::ActionResponse;
use crate::application::services::{DownloadDto, DownloadError, DownloadService};
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use crate::startup::AppState;

use super::{file_response, parse_id};

fn map_download_error(e: DownloadError) -> AppError {
    match e {
        DownloadError::NotFound => AppError::NotFound("Download not found".into()),
        DownloadError::Expired => AppError::Gone("Download link has expired".into()),
        DownloadError::LimitReached => AppError::Forbidden("Download limit reached".into()),
        DownloadError::FileMissing => AppError::NotFound("Product file is missing".into()),
        DownloadError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Redeem a download token and serve the product file
pub async fn redeem(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let redeemed = state
        .download_service()
        .redeem(&token)
        .await
        .map_err(map_download_error)?;

    let bytes = state
        .files
        .read(&redeemed.file_path)
        .await
        .map_err(|e| match e {
            StorageError::NotFound(_) => AppError::NotFound("Product file is missing".into()),
            e => AppError::Internal(e.to_string()),
        })?;

    tracing::info!(
        download_id = redeemed.download.id,
        order_id = redeemed.download.order_id,
        count = redeemed.download.download_count,
        "Download redeemed"
    );

    Ok(file_response(
        bytes,
        "application/octet-stream",
        &redeemed.file_path,
        false,
    ))
}

/// Download grants for an order
pub async fn admin_list_for_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Vec<DownloadDto>>, AppError> {
    let order_id = parse_id(&order_id, "order")?;

    let downloads = state
        .download_service()
        .list_for_order(order_id)
        .await
        .map_err(map_download_error)?;

    Ok(Json(downloads))
}

/// Zero the counter and restart the validity window
pub async fn admin_reset(
    State(state): State<AppState>,
    Path(download_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let download_id = parse_id(&download_id, "download")?;

    state
        .download_service()
        .reset(download_id)
        .await
        .map_err(map_download_error)?;

    Ok(Json(ActionResponse::ok("Download reset")))
}
