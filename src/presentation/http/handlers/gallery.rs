//! Gallery Handlers

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};

use crate::application::dto::request::ReorderGalleryRequest;
use crate::application::dto::response::ActionResponse;
use crate::application::services::{GalleryError, GalleryService, UploadImageDto};
use crate::domain::{AlbumSummary, GalleryImage};
use crate::infrastructure::storage::StorageError;
use crate::shared::error::AppError;
use crate::startup::AppState;

use super::{file_response, parse_id, read_upload_form};

fn map_gallery_error(e: GalleryError) -> AppError {
    match e {
        GalleryError::NotFound => AppError::NotFound("Image not found".into()),
        GalleryError::NotAnImage => {
            AppError::Validation("Only image uploads are accepted".into())
        }
        GalleryError::EmptyFile => AppError::Validation("Uploaded file is empty".into()),
        GalleryError::NotInAlbum(id) => {
            AppError::BadRequest(format!("Image {} is not in this album", id))
        }
        GalleryError::Storage(StorageError::NotFound(_)) => {
            AppError::NotFound("Image file is missing".into())
        }
        GalleryError::Storage(e) => AppError::Internal(e.to_string()),
        GalleryError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Albums with image counts
pub async fn list_albums(
    State(state): State<AppState>,
) -> Result<Json<Vec<AlbumSummary>>, AppError> {
    let albums = state
        .gallery_service()
        .list_albums()
        .await
        .map_err(map_gallery_error)?;

    Ok(Json(albums))
}

/// Images of one album in display order
pub async fn list_album(
    State(state): State<AppState>,
    Path(album): Path<String>,
) -> Result<Json<Vec<GalleryImage>>, AppError> {
    let images = state
        .gallery_service()
        .list_album(&album)
        .await
        .map_err(map_gallery_error)?;

    Ok(Json(images))
}

/// Serve an image file
pub async fn image_file(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Response, AppError> {
    let image_id = parse_id(&image_id, "image")?;

    let (image, bytes) = state
        .gallery_service()
        .image_file(image_id)
        .await
        .map_err(map_gallery_error)?;

    Ok(file_response(bytes, &image.content_type, &image.title, true))
}

/// Upload an image (multipart: album, title, caption, file)
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<GalleryImage>), AppError> {
    let mut form = read_upload_form(multipart).await?;
    let file = form.take_file()?;

    let request = UploadImageDto {
        album: form.required("album")?,
        title: form.text("title").unwrap_or_else(|| file.file_name.clone()),
        caption: form.text("caption"),
        file_name: file.file_name,
        content_type: file.content_type,
        bytes: file.bytes,
    };

    let image = state
        .gallery_service()
        .upload(request)
        .await
        .map_err(map_gallery_error)?;

    Ok((StatusCode::CREATED, Json(image)))
}

/// Reorder an album
pub async fn reorder_album(
    State(state): State<AppState>,
    Path(album): Path<String>,
    Json(body): Json<ReorderGalleryRequest>,
) -> Result<Json<Vec<GalleryImage>>, AppError> {
    let ids = body
        .image_ids
        .iter()
        .map(|id| parse_id(id, "image"))
        .collect::<Result<Vec<_>, _>>()?;

    let images = state
        .gallery_service()
        .reorder(&album, &ids)
        .await
        .map_err(map_gallery_error)?;

    Ok(Json(images))
}

/// Delete an image and its file
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let image_id = parse_id(&image_id, "image")?;

    state
        .gallery_service()
        .delete(image_id)
        .await
        .map_err(map_gallery_error)?;

    Ok(Json(ActionResponse::ok("Image deleted")))
}
