//! MusicBrainz catalog client. No API key; identified only by User-Agent,
//! and rate-limited to 1 request/second per their usage policy.

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::common::CatalogArtist;
use super::rate_limit::RateLimiter;

const API_BASE: &str = "https://musicbrainz.org/ws/2";
const USER_AGENT: &str = "Vibarr/1.0 (+https://vibarr.app)";

pub struct MusicBrainzClient {
    client: Client,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: Vec<ArtistRecord>,
}

#[derive(Debug, Deserialize)]
struct ArtistRecord {
    id: String,
    name: String,
    #[serde(default)]
    tags: Vec<TagRecord>,
}

#[derive(Debug, Deserialize)]
struct TagRecord {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupResponse {
    #[serde(rename = "release-groups")]
    release_groups: Vec<ReleaseGroupDto>,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroupDto {
    id: String,
    title: String,
    #[serde(rename = "first-release-date")]
    first_release_date: Option<String>,
}

/// A release-group candidate for the `check-new-releases` job.
#[derive(Debug, Clone)]
pub struct ReleaseGroupRecord {
    pub musicbrainz_release_group_id: String,
    pub title: String,
    pub release_date: Option<NaiveDate>,
}

impl MusicBrainzClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            rate_limiter: RateLimiter::per_second(1.0),
        }
    }

    /// MusicBrainz requires no credentials; always available.
    pub fn is_available(&self) -> bool {
        true
    }

    pub async fn rate_limit_tokens_remaining(&self) -> f64 {
        self.rate_limiter.tokens_remaining().await
    }

    pub async fn search_artists(&self, query: &str, limit: u32) -> Vec<CatalogArtist> {
        self.rate_limiter.acquire().await;

        let url = format!("{API_BASE}/artist");
        let result = self
            .client
            .get(&url)
            .query(&[
                ("query", query.to_string()),
                ("limit", limit.to_string()),
                ("fmt", "json".to_string()),
            ])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<SearchResponse>().await {
                Ok(parsed) => parsed
                    .artists
                    .into_iter()
                    .map(|a| CatalogArtist {
                        external_id: a.id,
                        name: a.name,
                        genres: a.tags.into_iter().map(|t| t.name).collect(),
                        popularity: None,
                        image_url: None,
                        match_score: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "musicbrainz search response parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "musicbrainz search request failed");
                vec![]
            }
        }
    }

    pub async fn similar_artists(&self, _musicbrainz_id: &str) -> Vec<CatalogArtist> {
        // MusicBrainz has no native similarity endpoint; relation-based
        // similarity is out of scope for this client.
        vec![]
    }

    /// Release groups credited to `artist_mbid`, for the `check-new-releases`
    /// job to diff against what's already in the library.
    pub async fn release_groups_for_artist(&self, artist_mbid: &str) -> Vec<ReleaseGroupRecord> {
        self.rate_limiter.acquire().await;

        let url = format!("{API_BASE}/release-group");
        let result = self
            .client
            .get(&url)
            .query(&[("artist", artist_mbid), ("fmt", "json")])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<ReleaseGroupResponse>().await {
                Ok(parsed) => parsed
                    .release_groups
                    .into_iter()
                    .map(|rg| ReleaseGroupRecord {
                        musicbrainz_release_group_id: rg.id,
                        title: rg.title,
                        release_date: rg
                            .first_release_date
                            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "musicbrainz release-group parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "musicbrainz release-group request failed");
                vec![]
            }
        }
    }
}

impl Default for MusicBrainzClient {
    fn default() -> Self {
        Self::new()
    }
}
