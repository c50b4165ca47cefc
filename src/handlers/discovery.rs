//! Exploratory, non-persisted catalog browsing — distinct from
//! `recommendations`, which is CRUD over the persisted, scored recommendation
//! feed.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::Result;
use crate::models::user::AuthenticatedUser;
use crate::services::integrations::common::CatalogArtist;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    #[serde(default)]
    pub limit: u32,
}

fn limit_or_default(limit: u32) -> u32 {
    if limit == 0 {
        20
    } else {
        limit.min(50)
    }
}

pub async fn similar_artists_handler(
    State(state): State<AppState>,
    Path(artist_id): Path<Uuid>,
    Query(query): Query<SimilarQuery>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CatalogArtist>>> {
    let artist = state.entities.artists.get(artist_id).await?;
    let limit = limit_or_default(query.limit);

    let mut similar = state.integrations.lastfm.similar_artists(&artist.name, limit).await;
    if similar.is_empty() {
        if let Some(mbid) = &artist.musicbrainz_id {
            similar = state.integrations.musicbrainz.similar_artists(mbid).await;
        }
    }
    Ok(Json(similar))
}

#[derive(Debug, Deserialize)]
pub struct GenreQuery {
    pub genre_id: i64,
    #[serde(default)]
    pub limit: u32,
}

pub async fn genre_artists_handler(
    State(state): State<AppState>,
    Query(query): Query<GenreQuery>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<CatalogArtist>>> {
    let limit = limit_or_default(query.limit);
    Ok(Json(state.integrations.deezer.genre_artists(query.genre_id, limit).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_falls_back_to_default() {
        assert_eq!(limit_or_default(0), 20);
    }

    #[test]
    fn caps_at_fifty() {
        assert_eq!(limit_or_default(500), 50);
    }

    #[test]
    fn passes_through_reasonable_values() {
        assert_eq!(limit_or_default(10), 10);
    }
}
