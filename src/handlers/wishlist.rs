use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::user::AuthenticatedUser;
use crate::models::wishlist::{CreateWishlistItemRequest, WishlistItem};
use crate::services::download_pipeline;
use crate::AppState;

pub async fn list_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<WishlistItem>>> {
    Ok(Json(state.entities.wishlist.list_for_user(user.user.id).await?))
}

pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<WishlistItem>> {
    Ok(Json(state.entities.wishlist.get(id).await?))
}

pub async fn create_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateWishlistItemRequest>,
) -> Result<(StatusCode, Json<WishlistItem>)> {
    let item = state.entities.wishlist.create(user.user.id, request).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<StatusCode> {
    state.entities.wishlist.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct SearchTriggeredResponse {
    pub grabbed: bool,
}

/// Manual, always-grab search for a single item — unlike the scheduled
/// `process-wishlist` job, this bypasses the auto-download gate.
pub async fn search_now_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<Json<SearchTriggeredResponse>> {
    let item = state.entities.wishlist.get(id).await?;
    if item.user_id != user.user.id {
        return Err(AppError::Forbidden { reason: "not your wishlist item".to_string() });
    }

    let grabbed = download_pipeline::search_and_grab_manual(
        &state.entities,
        &state.integrations,
        &state.settings,
        &state.fanout,
        &item,
    )
    .await?;

    Ok(Json(SearchTriggeredResponse { grabbed }))
}
