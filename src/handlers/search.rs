//! Ad-hoc multi-catalog search, fanned out across whichever clients are
//! configured. Results are not persisted; callers add what they want to the
//! library via `artists`/`albums`/`wishlist`.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::user::AuthenticatedUser;
use crate::services::integrations::common::{CatalogAlbum, CatalogArtist};
use crate::AppState;

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct ArtistSearchResponse {
    pub spotify: Vec<CatalogArtist>,
    pub musicbrainz: Vec<CatalogArtist>,
    pub deezer: Vec<CatalogArtist>,
    pub youtube_music: Vec<CatalogArtist>,
    pub audiodb: Vec<CatalogArtist>,
}

fn validate_query(q: &str, limit: u32) -> Result<()> {
    if q.trim().is_empty() {
        return Err(AppError::Invalid {
            token: "q".to_string(),
            message: "search query must not be empty".to_string(),
        });
    }
    if q.len() > 200 {
        return Err(AppError::Invalid {
            token: "q".to_string(),
            message: "search query too long".to_string(),
        });
    }
    if limit > 50 {
        return Err(AppError::Invalid {
            token: "limit".to_string(),
            message: "limit must not exceed 50".to_string(),
        });
    }
    Ok(())
}

pub async fn search_artists_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    _user: AuthenticatedUser,
) -> Result<Json<ArtistSearchResponse>> {
    validate_query(&query.q, query.limit)?;

    let (spotify, musicbrainz, deezer, youtube_music, audiodb) = tokio::join!(
        state.integrations.spotify.search_artists(&query.q, query.limit),
        state.integrations.musicbrainz.search_artists(&query.q, query.limit),
        state.integrations.deezer.search_artists(&query.q, query.limit),
        state.integrations.youtube_music.search_artists(&query.q, query.limit),
        state.integrations.audiodb.search_artists(&query.q),
    );

    Ok(Json(ArtistSearchResponse { spotify, musicbrainz, deezer, youtube_music, audiodb }))
}

#[derive(Debug, Serialize)]
pub struct AlbumSearchResponse {
    pub spotify: Vec<CatalogAlbum>,
    pub deezer: Vec<CatalogAlbum>,
}

pub async fn search_albums_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    _user: AuthenticatedUser,
) -> Result<Json<AlbumSearchResponse>> {
    validate_query(&query.q, query.limit)?;

    let (spotify, deezer) = tokio::join!(
        state.integrations.spotify.search_albums(&query.q, query.limit),
        state.integrations.deezer.search_albums(&query.q, query.limit),
    );

    Ok(Json(AlbumSearchResponse { spotify, deezer }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_query() {
        assert!(validate_query("   ", 20).is_err());
    }

    #[test]
    fn rejects_overlong_query() {
        let q = "a".repeat(201);
        assert!(validate_query(&q, 20).is_err());
    }

    #[test]
    fn rejects_limit_above_cap() {
        assert!(validate_query("radiohead", 51).is_err());
    }

    #[test]
    fn accepts_reasonable_query() {
        assert!(validate_query("radiohead", 20).is_ok());
    }
}
