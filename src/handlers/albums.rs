use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::album::Album;
use crate::models::user::AuthenticatedUser;
use crate::AppState;

pub async fn get_album_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Album>> {
    Ok(Json(state.entities.albums.get(id).await?))
}

pub async fn list_for_artist_handler(
    State(state): State<AppState>,
    Path(artist_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Album>>> {
    Ok(Json(state.entities.albums.list_for_artist(artist_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub since: Option<NaiveDate>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Albums released since `since` (default: 30 days ago), across all artists —
/// used by the release-radar widget, independent of the scheduled job of the
/// same name.
pub async fn recent_releases_handler(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Album>>> {
    let since = query.since.unwrap_or_else(|| (chrono::Utc::now() - chrono::Duration::days(30)).date_naive());
    let albums = state.entities.albums.released_since(since, query.limit.unwrap_or(50)).await?;
    Ok(Json(albums))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkInLibraryRequest {
    pub format: String,
    pub bitrate: Option<i32>,
    pub sample_rate: Option<i32>,
}

pub async fn mark_in_library_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    _user: AuthenticatedUser,
    Json(request): Json<MarkInLibraryRequest>,
) -> Result<Json<Album>> {
    state
        .entities
        .albums
        .mark_in_library(id, &request.format, request.bitrate, request.sample_rate)
        .await?;
    Ok(Json(state.entities.albums.get(id).await?))
}
