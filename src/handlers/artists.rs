use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::artist::{Artist, ArtistSummary};
use crate::models::user::AuthenticatedUser;
use crate::AppState;

pub async fn get_artist_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Artist>> {
    Ok(Json(state.entities.artists.get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn list_in_library_handler(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<ArtistSummary>>> {
    let artists = state
        .entities
        .artists
        .list_in_library(page.limit.unwrap_or(50), page.offset.unwrap_or(0))
        .await?;
    Ok(Json(artists.into_iter().map(ArtistSummary::from).collect()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagArtistRequest {
    pub tags: Vec<String>,
}

pub async fn tag_artist_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(request): Json<TagArtistRequest>,
) -> Result<Json<Artist>> {
    if !user.user.is_admin && request.tags.len() > 50 {
        return Err(AppError::Invalid {
            token: "tags".to_string(),
            message: "too many tags".to_string(),
        });
    }
    state.entities.artists.set_tags(id, &request.tags).await?;
    Ok(Json(state.entities.artists.get(id).await?))
}
