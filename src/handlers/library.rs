//! Read-only views over what's actually in the media library. Triggering a
//! sync happens on the scheduler's own cadence; there is no manual-sync
//! action endpoint here.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::handlers::artists::PageQuery;
use crate::models::artist::ArtistSummary;
use crate::models::track::Track;
use crate::models::user::AuthenticatedUser;
use crate::AppState;

pub async fn list_artists_handler(
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

pub async fn list_tracks_for_artist_handler(
    State(state): State<AppState>,
    Path(artist_id): Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Track>>> {
    Ok(Json(state.entities.tracks.list_in_library_for_artist(artist_id).await?))
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub plex_connected: bool,
    pub beets_enabled: bool,
    pub artists_in_library: i64,
}

pub async fn sync_status_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<SyncStatusResponse>> {
    let count = state
        .entities
        .artists
        .list_in_library(i64::MAX, 0)
        .await
        .map(|a| a.len() as i64)
        .unwrap_or(0);

    Ok(Json(SyncStatusResponse {
        plex_connected: state.integrations.plex.is_available(),
        beets_enabled: state.integrations.beets.is_available().await,
        artists_in_library: count,
    }))
}
