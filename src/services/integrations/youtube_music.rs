//! YouTube Music catalog client. There is no official YouTube Music API, so
//! this rides on the public YouTube Data API v3 (search + playlistItems),
//! which is close enough for artist lookup and playlist-url resolution.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::common::CatalogArtist;
use super::rate_limit::RateLimiter;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

pub struct YoutubeMusicClient {
    client: Client,
    api_key: Option<String>,
    rate_limiter: RateLimiter,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
    thumbnails: Thumbnails,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItemSnippet {
    title: String,
    #[serde(rename = "videoOwnerChannelTitle")]
    video_owner_channel_title: Option<String>,
}

impl YoutubeMusicClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            api_key,
            rate_limiter: RateLimiter::per_minute(30.0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn rate_limit_tokens_remaining(&self) -> f64 {
        self.rate_limiter.tokens_remaining().await
    }

    pub async fn search_artists(&self, query: &str, limit: u32) -> Vec<CatalogArtist> {
        let Some(api_key) = self.api_key.as_deref() else {
            return vec![];
        };
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{API_BASE}/search"))
            .query(&[
                ("part", "snippet"),
                ("type", "channel"),
                ("q", query),
                ("maxResults", &limit.to_string()),
                ("key", api_key),
            ])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<SearchResponse>().await {
                Ok(parsed) => parsed
                    .items
                    .into_iter()
                    .map(|item| CatalogArtist {
                        external_id: item.snippet.channel_id.unwrap_or_default(),
                        name: item.snippet.title,
                        genres: vec![],
                        popularity: None,
                        image_url: item.snippet.thumbnails.medium.map(|t| t.url),
                        match_score: None,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "youtube music artist search parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "youtube music artist search request failed");
                vec![]
            }
        }
    }

    /// Resolves a `music.youtube.com`/`youtube.com` playlist URL to its
    /// `(artist, track_title)` pairs.
    pub async fn resolve_playlist_url(&self, url: &str) -> Vec<(String, String)> {
        let Some(api_key) = self.api_key.as_deref() else {
            return vec![];
        };
        let Some(playlist_id) = extract_playlist_id(url) else {
            warn!(url, "youtube music url had no `list` query parameter");
            return vec![];
        };
        self.rate_limiter.acquire().await;

        let result = self
            .client
            .get(format!("{API_BASE}/playlistItems"))
            .query(&[
                ("part", "snippet"),
                ("playlistId", playlist_id),
                ("maxResults", "50"),
                ("key", api_key),
            ])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<PlaylistItemsResponse>().await {
                Ok(parsed) => parsed
                    .items
                    .into_iter()
                    .map(|item| {
                        (
                            item.snippet
                                .video_owner_channel_title
                                .unwrap_or_else(|| "unknown".to_string()),
                            item.snippet.title,
                        )
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "youtube music playlist parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "youtube music playlist request failed");
                vec![]
            }
        }
    }
}

fn extract_playlist_id(url: &str) -> Option<&str> {
    url.split('?')
        .nth(1)?
        .split('&')
        .find_map(|pair| pair.strip_prefix("list="))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_list_query_param() {
        assert_eq!(
            extract_playlist_id("https://music.youtube.com/playlist?list=PL123&feature=share"),
            Some("PL123")
        );
    }

    #[test]
    fn missing_list_param_returns_none() {
        assert_eq!(extract_playlist_id("https://music.youtube.com/watch?v=abc"), None);
    }
}
