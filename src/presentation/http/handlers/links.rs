//! Link Directory Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::LinkRequest;
use crate::application::dto::response::ActionResponse;
use crate::application::services::{LinkCategoryDto, LinkError, LinkInputDto, LinkService};
use crate::domain::Link;
use crate::shared::error::AppError;
use crate::shared::validation::validate;
use crate::startup::AppState;

use super::parse_id;

fn map_link_error(e: LinkError) -> AppError {
    match e {
        LinkError::NotFound => AppError::NotFound("Link not found".into()),
        LinkError::Internal(msg) => AppError::Internal(msg),
    }
}

impl From<LinkRequest> for LinkInputDto {
    fn from(req: LinkRequest) -> Self {
        Self {
            title: req.title,
            url: req.url,
            category: req.category,
            description: req.description,
            sort_order: req.sort_order,
            is_active: req.is_active,
        }
    }
}

/// Active links grouped by category
pub async fn list_links(
    State(state): State<AppState>,
) -> Result<Json<Vec<LinkCategoryDto>>, AppError> {
    let groups = state.link_service().grouped().await.map_err(map_link_error)?;
    Ok(Json(groups))
}

pub async fn admin_list_links(State(state): State<AppState>) -> Result<Json<Vec<Link>>, AppError> {
    let links = state.link_service().admin_list().await.map_err(map_link_error)?;
    Ok(Json(links))
}

pub async fn create_link(
    State(state): State<AppState>,
    Json(body): Json<LinkRequest>,
) -> Result<(StatusCode, Json<Link>), AppError> {
    validate(&body)?;

    let link = state
        .link_service()
        .create(body.into())
        .await
        .map_err(map_link_error)?;

    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn update_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
    Json(body): Json<LinkRequest>,
) -> Result<Json<Link>, AppError> {
    validate(&body)?;
    let link_id = parse_id(&link_id, "link")?;

    let link = state
        .link_service()
        .update(link_id, body.into())
        .await
        .map_err(map_link_error)?;

    Ok(Json(link))
}

pub async fn delete_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let link_id = parse_id(&link_id, "link")?;

    state
        .link_service()
        .delete(link_id)
        .await
        .map_err(map_link_error)?;

    Ok(Json(ActionResponse::ok("Link deleted")))
}
