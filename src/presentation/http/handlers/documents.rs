//! Document Library Handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};

use crate::application::dto::request::{DocumentListQuery, UpdateDocumentRequest};
use crate::application::dto::response::ActionResponse;
use crate::application::services::{
    DocumentError, DocumentService, UpdateDocumentDto, UploadDocumentDto,
};
use crate::domain::Document;
use crate::infrastructure::storage::StorageError;
use crate::presentation::http::extractors::MaybeAuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

use super::{file_response, parse_id, read_upload_form};

fn map_document_error(e: DocumentError) -> AppError {
    match e {
        DocumentError::NotFound => AppError::NotFound("Document not found".into()),
        DocumentError::EmptyFile => AppError::Validation("Uploaded file is empty".into()),
        DocumentError::Storage(StorageError::NotFound(_)) => {
            AppError::NotFound("Document file is missing".into())
        }
        DocumentError::Storage(e) => AppError::Internal(e.to_string()),
        DocumentError::Internal(msg) => AppError::Internal(msg),
    }
}

/// Documents visible to the caller; admins also see private ones
pub async fn list_documents(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = state
        .document_service()
        .list(user.is_admin(), query.category.as_deref())
        .await
        .map_err(map_document_error)?;

    Ok(Json(documents))
}

/// Download a document file
pub async fn download_document(
    State(state): State<AppState>,
    user: MaybeAuthUser,
    Path(document_id): Path<String>,
) -> Result<Response, AppError> {
    let document_id = parse_id(&document_id, "document")?;

    let (document, bytes) = state
        .document_service()
        .download(document_id, user.is_admin())
        .await
        .map_err(map_document_error)?;

    Ok(file_response(
        bytes,
        &document.content_type,
        &document.file_name,
        false,
    ))
}

/// Upload a document (multipart: title, description, category, is_public, file)
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let mut form = read_upload_form(multipart).await?;
    let file = form.take_file()?;

    let title = form.required("title")?;
    if title.chars().count() > 200 {
        return Err(AppError::Validation("title: Title must be 1-200 characters".into()));
    }

    let request = UploadDocumentDto {
        title,
        description: form.text("description"),
        category: form.text("category").unwrap_or_else(|| "general".to_string()),
        is_public: form.flag("is_public"),
        file_name: file.file_name,
        content_type: file.content_type,
        bytes: file.bytes,
    };

    let document = state
        .document_service()
        .upload(request)
        .await
        .map_err(map_document_error)?;

    Ok((StatusCode::CREATED, Json(document)))
}

/// Update document metadata
pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, AppError> {
    validate(&body)?;
    let document_id = parse_id(&document_id, "document")?;

    let update = UpdateDocumentDto {
        title: body.title,
        description: body.description,
        category: body.category,
        is_public: body.is_public,
    };

    let document = state
        .document_service()
        .update_metadata(document_id, update)
        .await
        .map_err(map_document_error)?;

    Ok(Json(document))
}

/// Delete a document and its file
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let document_id = parse_id(&document_id, "document")?;

    state
        .document_service()
        .delete(document_id)
        .await
        .map_err(map_document_error)?;

    Ok(Json(ActionResponse::ok("Document deleted")))
}
