//! Spotify catalog client, client-credentials flow. Rate limit: 10 req/min
//! per the settings-derived budget (Spotify's own limits are far looser;
//! this keeps us well under them while sharing the map with Last.fm).

use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

use super::common::{CatalogAlbum, CatalogArtist};
use super::rate_limit::RateLimiter;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

pub struct SpotifyClient {
    client: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Arc<RwLock<Option<String>>>,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ArtistSearchResponse {
    artists: ArtistPage,
}

#[derive(Debug, Deserialize)]
struct ArtistPage {
    items: Vec<ArtistRecord>,
}

#[derive(Debug, Deserialize)]
struct ArtistRecord {
    id: String,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
    popularity: Option<i32>,
    images: Vec<ImageRecord>,
}

#[derive(Debug, Deserialize)]
struct ImageRecord {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AlbumSearchResponse {
    albums: AlbumPage,
}

#[derive(Debug, Deserialize)]
struct AlbumPage {
    items: Vec<AlbumRecord>,
}

#[derive(Debug, Deserialize)]
struct AlbumRecord {
    id: String,
    name: String,
    artists: Vec<SimpleArtist>,
    release_date: Option<String>,
    total_tracks: Option<i32>,
    images: Vec<ImageRecord>,
}

#[derive(Debug, Deserialize)]
struct SimpleArtist {
    name: String,
}

impl SpotifyClient {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            client_id,
            client_secret,
            access_token: Arc::new(RwLock::new(None)),
            rate_limiter: RateLimiter::per_minute(10.0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    pub async fn rate_limit_tokens_remaining(&self) -> f64 {
        self.rate_limiter.tokens_remaining().await
    }

    async fn ensure_token(&self) -> Option<String> {
        if let Some(token) = self.access_token.read().await.clone() {
            return Some(token);
        }

        let (id, secret) = (self.client_id.as_ref()?, self.client_secret.as_ref()?);
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "spotify token request failed");
            return None;
        }

        let token: TokenResponse = response.json().await.ok()?;
        *self.access_token.write().await = Some(token.access_token.clone());
        Some(token.access_token)
    }

    pub async fn search_artists(&self, query: &str, limit: u32) -> Vec<CatalogArtist> {
        if !self.is_available() {
            return vec![];
        }
        self.rate_limiter.acquire().await;

        let Some(token) = self.ensure_token().await else {
            return vec![];
        };

        let result = self
            .client
            .get(format!("{API_BASE}/search"))
            .bearer_auth(token)
            .query(&[("q", query), ("type", "artist"), ("limit", &limit.to_string())])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<ArtistSearchResponse>().await {
                Ok(parsed) => parsed
                    .artists
                    .items
                    .into_iter()
                    .map(|a| CatalogArtist {
                        external_id: a.id,
                        name: a.name,
                        genres: a.genres,
                        popularity: a.popularity,
                        image_url: a.images.into_iter().next().map(|i| i.url),
                        match_score: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "spotify artist search parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "spotify artist search request failed");
                vec![]
            }
        }
    }

    pub async fn search_albums(&self, query: &str, limit: u32) -> Vec<CatalogAlbum> {
        if !self.is_available() {
            return vec![];
        }
        self.rate_limiter.acquire().await;

        let Some(token) = self.ensure_token().await else {
            return vec![];
        };

        let result = self
            .client
            .get(format!("{API_BASE}/search"))
            .bearer_auth(token)
            .query(&[("q", query), ("type", "album"), ("limit", &limit.to_string())])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<AlbumSearchResponse>().await {
                Ok(parsed) => parsed
                    .albums
                    .items
                    .into_iter()
                    .map(|a| CatalogAlbum {
                        external_id: a.id,
                        title: a.name,
                        artist_name: a
                            .artists
                            .into_iter()
                            .next()
                            .map(|ar| ar.name)
                            .unwrap_or_default(),
                        release_date: a
                            .release_date
                            .and_then(|d| chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                        total_tracks: a.total_tracks,
                        cover_url: a.images.into_iter().next().map(|i| i.url),
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "spotify album search parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "spotify album search request failed");
                vec![]
            }
        }
    }
}
