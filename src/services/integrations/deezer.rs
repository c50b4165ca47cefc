//! Deezer catalog client. Fully public, unauthenticated REST API; no rate
//! limit is documented, but we still budget it like the other catalog
//! clients so one misbehaving job can't hammer it.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::common::{CatalogAlbum, CatalogArtist};
use super::rate_limit::RateLimiter;

const API_BASE: &str = "https://api.deezer.com";

pub struct DeezerClient {
    client: Client,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ArtistRecord {
    id: i64,
    name: String,
    picture_medium: Option<String>,
    nb_fan: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct AlbumRecord {
    id: i64,
    title: String,
    artist: SimpleArtist,
    release_date: Option<String>,
    nb_tracks: Option<i32>,
    cover_medium: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimpleArtist {
    name: String,
}

impl DeezerClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            rate_limiter: RateLimiter::per_minute(30.0),
        }
    }

    /// Deezer needs no credentials; always available.
    pub fn is_available(&self) -> bool {
        true
    }

    pub async fn rate_limit_tokens_remaining(&self) -> f64 {
        self.rate_limiter.tokens_remaining().await
    }

    pub async fn search_artists(&self, query: &str, limit: u32) -> Vec<CatalogArtist> {
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{API_BASE}/search/artist"))
            .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<SearchResponse<ArtistRecord>>().await {
                Ok(parsed) => parsed
                    .data
                    .into_iter()
                    .map(|a| CatalogArtist {
                        external_id: a.id.to_string(),
                        name: a.name,
                        genres: vec![],
                        popularity: a.nb_fan,
                        image_url: a.picture_medium,
                        match_score: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "deezer artist search parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "deezer artist search request failed");
                vec![]
            }
        }
    }

    pub async fn search_albums(&self, query: &str, limit: u32) -> Vec<CatalogAlbum> {
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{API_BASE}/search/album"))
            .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<SearchResponse<AlbumRecord>>().await {
                Ok(parsed) => parsed
                    .data
                    .into_iter()
                    .map(|a| CatalogAlbum {
                        external_id: a.id.to_string(),
                        title: a.title,
                        artist_name: a.artist.name,
                        release_date: a
                            .release_date
                            .and_then(|d| chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                        total_tracks: a.nb_tracks,
                        cover_url: a.cover_medium,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "deezer album search parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "deezer album search request failed");
                vec![]
            }
        }
    }

    /// Canonical genre lookup used by the genre-explore recommendation candidate.
    pub async fn genre_artists(&self, genre_id: i64, limit: u32) -> Vec<CatalogArtist> {
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{API_BASE}/genre/{genre_id}/artists"))
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<SearchResponse<ArtistRecord>>().await {
                Ok(parsed) => parsed
                    .data
                    .into_iter()
                    .take(limit as usize)
                    .map(|a| CatalogArtist {
                        external_id: a.id.to_string(),
                        name: a.name,
                        genres: vec![],
                        popularity: a.nb_fan,
                        image_url: a.picture_medium,
                        match_score: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "deezer genre-artists parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "deezer genre-artists request failed");
                vec![]
            }
        }
    }

    /// Resolves a `deezer.com` playlist URL to its `(artist, track_title)` pairs.
    pub async fn resolve_playlist_url(&self, url: &str) -> Vec<(String, String)> {
        let Some(playlist_id) = extract_playlist_id(url) else {
            warn!(url, "deezer playlist url did not contain a numeric id");
            return vec![];
        };
        self.rate_limiter.acquire().await;

        #[derive(Debug, Deserialize)]
        struct PlaylistTrack {
            title: String,
            artist: SimpleArtist,
        }
        #[derive(Debug, Deserialize)]
        struct PlaylistTracks {
            #[serde(default)]
            data: Vec<PlaylistTrack>,
        }
        #[derive(Debug, Deserialize)]
        struct PlaylistResponse {
            tracks: PlaylistTracks,
        }

        let result = self
            .client
            .get(format!("{API_BASE}/playlist/{playlist_id}"))
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<PlaylistResponse>().await {
                Ok(parsed) => parsed
                    .tracks
                    .data
                    .into_iter()
                    .map(|t| (t.artist.name, t.title))
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "deezer playlist parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "deezer playlist request failed");
                vec![]
            }
        }
    }
}

impl Default for DeezerClient {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_playlist_id(url: &str) -> Option<&str> {
    url.rsplit('/').find(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_numeric_playlist_id() {
        assert_eq!(
            extract_playlist_id("https://www.deezer.com/playlist/1234567890"),
            Some("1234567890")
        );
    }

    #[test]
    fn rejects_non_numeric_trailing_segment() {
        assert_eq!(extract_playlist_id("https://www.deezer.com/playlist/"), None);
    }
}
