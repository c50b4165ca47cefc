//! TheAudioDB catalog client. Used mainly for artist biography/genre
//! enrichment and a secondary similar-artists source alongside Last.fm.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::common::CatalogArtist;
use super::rate_limit::RateLimiter;

const API_BASE: &str = "https://www.theaudiodb.com/api/v1/json";

pub struct AudioDbClient {
    client: Client,
    api_key: String,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    artists: Option<Vec<ArtistRecord>>,
}

#[derive(Debug, Deserialize)]
struct ArtistRecord {
    #[serde(rename = "idArtist")]
    id_artist: String,
    #[serde(rename = "strArtist")]
    name: String,
    #[serde(rename = "strGenre")]
    genre: Option<String>,
    #[serde(rename = "strArtistThumb")]
    thumb: Option<String>,
}

impl AudioDbClient {
    /// `api_key` of `"2"` is TheAudioDB's published free-tier test key.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            api_key: api_key.unwrap_or_else(|| "2".to_string()),
            rate_limiter: RateLimiter::per_minute(30.0),
        }
    }

    pub fn is_available(&self) -> bool {
        true
    }

    pub async fn rate_limit_tokens_remaining(&self) -> f64 {
        self.rate_limiter.tokens_remaining().await
    }

    pub async fn search_artists(&self, name: &str) -> Vec<CatalogArtist> {
        self.rate_limiter.acquire().await;

        let url = format!("{API_BASE}/{}/search.php", self.api_key);
        let result = self.client.get(url).query(&[("s", name)]).send().await;

        match result {
            Ok(response) => match response.json::<SearchResponse>().await {
                Ok(parsed) => parsed
                    .artists
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| CatalogArtist {
                        external_id: a.id_artist,
                        name: a.name,
                        genres: a.genre.into_iter().collect(),
                        popularity: None,
                        image_url: a.thumb,
                        match_score: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "audiodb artist search parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "audiodb artist search request failed");
                vec![]
            }
        }
    }

    /// Detail fetch by canonical id; returns an absent optional on any error.
    pub async fn artist_by_id(&self, audiodb_id: &str) -> Option<CatalogArtist> {
        self.rate_limiter.acquire().await;

        let url = format!("{API_BASE}/{}/artist.php", self.api_key);
        let response = self
            .client
            .get(url)
            .query(&[("i", audiodb_id)])
            .send()
            .await
            .map_err(|e| warn!(error = %e, "audiodb artist detail request failed"))
            .ok()?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| warn!(error = %e, "audiodb artist detail parse failed"))
            .ok()?;

        parsed
            .artists
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|a| CatalogArtist {
                external_id: a.id_artist,
                name: a.name,
                genres: a.genre.into_iter().collect(),
                popularity: None,
                image_url: a.thumb,
                match_score: None,
            })
    }
}
