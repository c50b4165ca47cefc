//! Plex media-server client. Unlike the catalog clients, a failed user-token
//! check is not swallowed: the pipeline needs to tell "no access to the
//! music section" apart from "Plex is unreachable", so `verify_token`
//! returns a `Result` instead of defaulting to empty.

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::error::{AppError, Result};

use super::common::{CatalogAlbum, CatalogArtist, CatalogTrack};
use super::rate_limit::RateLimiter;

pub struct PlexClient {
    client: Client,
    base_url: Option<String>,
    token: Option<String>,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Clone)]
pub struct PlexHistoryEntry {
    pub rating_key: String,
    pub track_title: String,
    pub album_title: Option<String>,
    pub artist_name: Option<String>,
    pub played_at: DateTime<Utc>,
    pub account_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MediaContainer<T> {
    #[serde(rename = "MediaContainer")]
    media_container: MediaContainerInner<T>,
}

#[derive(Debug, Deserialize)]
struct MediaContainerInner<T> {
    #[serde(default, rename = "Metadata")]
    metadata: Vec<T>,
    #[serde(default, rename = "Directory")]
    directories: Vec<Directory>,
}

#[derive(Debug, Deserialize)]
struct Directory {
    key: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ArtistMeta {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(rename = "Genre", default)]
    genre: Vec<GenreTag>,
}

#[derive(Debug, Deserialize)]
struct GenreTag {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct AlbumMeta {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(rename = "parentTitle")]
    parent_title: Option<String>,
    year: Option<i32>,
    #[serde(rename = "leafCount")]
    leaf_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct TrackMeta {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(rename = "grandparentTitle")]
    grandparent_title: Option<String>,
    #[serde(rename = "parentTitle")]
    parent_title: Option<String>,
    duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HistoryMeta {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    title: String,
    #[serde(rename = "parentTitle")]
    parent_title: Option<String>,
    #[serde(rename = "grandparentTitle")]
    grandparent_title: Option<String>,
    #[serde(rename = "viewedAt")]
    viewed_at: i64,
    #[serde(rename = "accountID")]
    account_id: Option<i64>,
}

impl PlexClient {
    pub fn new(base_url: Option<String>, token: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            base_url,
            token,
            rate_limiter: RateLimiter::per_second(5.0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.base_url.is_some() && self.token.is_some()
    }

    pub async fn rate_limit_tokens_remaining(&self) -> f64 {
        self.rate_limiter.tokens_remaining().await
    }

    fn base(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .ok_or_else(|| AppError::config_missing("plex_url"))
    }

    fn token_value(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::config_missing("plex_token"))
    }

    /// Returns `Ok(true)` if the token grants access to a "music" library
    /// section, `Ok(false)` if Plex answered but access is denied, and
    /// `Err` only when Plex itself could not be reached.
    pub async fn verify_token(&self, token: &str) -> Result<bool> {
        let base = self.base()?;
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(format!("{base}/library/sections"))
            .header("X-Plex-Token", token)
            .send()
            .await
            .map_err(|e| AppError::external_unavailable(format!("plex: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(AppError::external_unavailable(format!(
                "plex: unexpected status {}",
                response.status()
            )));
        }

        let parsed: MediaContainer<Directory> = response
            .json()
            .await
            .map_err(|e| AppError::external_unavailable(format!("plex: {e}")))?;

        Ok(parsed
            .media_container
            .directories
            .iter()
            .any(|d| d.kind == "artist"))
    }

    pub async fn list_artists(&self, section_key: &str) -> Vec<CatalogArtist> {
        let Ok(base) = self.base() else { return vec![] };
        let Ok(token) = self.token_value() else { return vec![] };
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{base}/library/sections/{section_key}/all"))
            .header("X-Plex-Token", token)
            .header("Accept", "application/json")
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<MediaContainer<ArtistMeta>>().await {
                Ok(parsed) => parsed
                    .media_container
                    .metadata
                    .into_iter()
                    .map(|a| CatalogArtist {
                        external_id: a.rating_key,
                        name: a.title,
                        genres: a.genre.into_iter().map(|g| g.tag).collect(),
                        popularity: None,
                        image_url: None,
                        match_score: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "plex list-artists parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "plex list-artists request failed");
                vec![]
            }
        }
    }

    pub async fn list_albums(&self, artist_rating_key: &str) -> Vec<CatalogAlbum> {
        let Ok(base) = self.base() else { return vec![] };
        let Ok(token) = self.token_value() else { return vec![] };
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{base}/library/metadata/{artist_rating_key}/children"))
            .header("X-Plex-Token", token)
            .header("Accept", "application/json")
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<MediaContainer<AlbumMeta>>().await {
                Ok(parsed) => parsed
                    .media_container
                    .metadata
                    .into_iter()
                    .map(|a| CatalogAlbum {
                        external_id: a.rating_key,
                        title: a.title,
                        artist_name: a.parent_title.unwrap_or_default(),
                        release_date: a.year.and_then(|y| {
                            chrono::NaiveDate::from_ymd_opt(y, 1, 1)
                        }),
                        total_tracks: a.leaf_count,
                        cover_url: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "plex list-albums parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "plex list-albums request failed");
                vec![]
            }
        }
    }

    pub async fn list_tracks(&self, album_rating_key: &str) -> Vec<CatalogTrack> {
        let Ok(base) = self.base() else { return vec![] };
        let Ok(token) = self.token_value() else { return vec![] };
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{base}/library/metadata/{album_rating_key}/children"))
            .header("X-Plex-Token", token)
            .header("Accept", "application/json")
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<MediaContainer<TrackMeta>>().await {
                Ok(parsed) => parsed
                    .media_container
                    .metadata
                    .into_iter()
                    .map(|t| CatalogTrack {
                        external_id: t.rating_key,
                        title: t.title,
                        artist_name: t.grandparent_title.unwrap_or_default(),
                        album_title: t.parent_title,
                        duration_seconds: t.duration.map(|ms| (ms / 1000) as i32),
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "plex list-tracks parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "plex list-tracks request failed");
                vec![]
            }
        }
    }

    /// Listening history since `since`, used by the scheduler's
    /// sync-listening-history job. `viewedAt` is epoch seconds.
    pub async fn listening_history_since(&self, since: DateTime<Utc>) -> Vec<PlexHistoryEntry> {
        let Ok(base) = self.base() else { return vec![] };
        let Ok(token) = self.token_value() else { return vec![] };
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{base}/status/sessions/history/all"))
            .header("X-Plex-Token", token)
            .header("Accept", "application/json")
            .query(&[("viewedAt>", since.timestamp().to_string())])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<MediaContainer<HistoryMeta>>().await {
                Ok(parsed) => parsed
                    .media_container
                    .metadata
                    .into_iter()
                    .filter_map(|h| {
                        let played_at = Utc.timestamp_opt(h.viewed_at, 0).single()?;
                        Some(PlexHistoryEntry {
                            rating_key: h.rating_key,
                            track_title: h.title,
                            album_title: h.parent_title,
                            artist_name: h.grandparent_title,
                            played_at,
                            account_id: h.account_id,
                        })
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "plex history parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "plex history request failed");
                vec![]
            }
        }
    }
}
