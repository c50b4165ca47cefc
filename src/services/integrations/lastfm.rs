//! Last.fm catalog client. Last.fm's official Rust bindings are blocking;
//! every call is handed to a blocking worker thread via `spawn_blocking` so
//! it cannot stall the scheduler's async runtime. Rate limit: 10 req/min.

use serde::Deserialize;
use tracing::warn;

use super::common::CatalogArtist;
use super::rate_limit::RateLimiter;

const API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";

pub struct LastfmClient {
    api_key: Option<String>,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct SimilarResponse {
    similarartists: SimilarArtists,
}

#[derive(Debug, Deserialize)]
struct SimilarArtists {
    artist: Vec<SimilarArtist>,
}

#[derive(Debug, Deserialize)]
struct SimilarArtist {
    name: String,
    mbid: Option<String>,
    #[serde(rename = "match")]
    match_: Option<String>,
}

impl LastfmClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            rate_limiter: RateLimiter::per_minute(10.0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn rate_limit_tokens_remaining(&self) -> f64 {
        self.rate_limiter.tokens_remaining().await
    }

    pub async fn similar_artists(&self, artist_name: &str, limit: u32) -> Vec<CatalogArtist> {
        let Some(api_key) = self.api_key.clone() else {
            return vec![];
        };
        self.rate_limiter.acquire().await;

        let artist_name = artist_name.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            fetch_similar_blocking(&api_key, &artist_name, limit)
        })
        .await;

        match outcome {
            Ok(Ok(artists)) => artists,
            Ok(Err(e)) => {
                warn!(error = %e, "lastfm similar-artists request failed");
                vec![]
            }
            Err(e) => {
                warn!(error = %e, "lastfm blocking task panicked");
                vec![]
            }
        }
    }
}

fn fetch_similar_blocking(
    api_key: &str,
    artist_name: &str,
    limit: u32,
) -> Result<Vec<CatalogArtist>, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let response = client
        .get(API_BASE)
        .query(&[
            ("method", "artist.getsimilar"),
            ("artist", artist_name),
            ("api_key", api_key),
            ("format", "json"),
            ("limit", &limit.to_string()),
        ])
        .send()?;

    let parsed: SimilarResponse = response.json()?;
    Ok(parsed
        .similarartists
        .artist
        .into_iter()
        .map(|a| CatalogArtist {
            external_id: a.mbid.unwrap_or_default(),
            name: a.name,
            genres: vec![],
            popularity: None,
            image_url: None,
            match_score: a.match_.and_then(|m| m.parse().ok()),
        })
        .collect())
}
