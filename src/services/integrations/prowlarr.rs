//! Prowlarr indexer-aggregator client. Kept thin: this module only talks to
//! Prowlarr's HTTP API and normalizes results. Relevance scoring is the
//! download pipeline's job, not the client's — `search_album` accepts a
//! scorer callback rather than embedding scoring logic here.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const MUSIC_CATEGORIES: [i32; 3] = [3000, 3010, 3040];

pub struct ProwlarrClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReleaseRecord {
    pub guid: String,
    pub indexer_id: i32,
    pub title: String,
    pub size_bytes: i64,
    pub seeders: Option<i32>,
    pub leechers: Option<i32>,
    pub protocol: Protocol,
    pub download_url: String,
    pub info_url: Option<String>,
    pub publish_date: chrono::DateTime<chrono::Utc>,
    pub categories: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Torrent,
    Usenet,
}

/// A release plus the score/gate the download pipeline computed for it.
#[derive(Debug, Clone)]
pub struct ScoredRelease {
    pub release: ReleaseRecord,
    pub score: f64,
    pub passes_text_relevance: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct GrabResult {
    pub success: bool,
    pub download_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResultDto {
    guid: String,
    #[serde(rename = "indexerId")]
    indexer_id: i32,
    title: String,
    size: i64,
    seeders: Option<i32>,
    leechers: Option<i32>,
    protocol: String,
    #[serde(rename = "downloadUrl")]
    download_url: Option<String>,
    #[serde(rename = "guid")]
    _guid2: Option<String>,
    #[serde(rename = "infoUrl")]
    info_url: Option<String>,
    #[serde(rename = "publishDate")]
    publish_date: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    categories: Vec<CategoryDto>,
}

#[derive(Debug, Deserialize)]
struct CategoryDto {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct GrabResponseDto {
    #[serde(default)]
    id: Option<i64>,
}

impl ProwlarrClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .expect("reqwest client"),
            base_url,
            api_key,
        }
    }

    pub fn is_available(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    pub async fn search(&self, query: &str) -> Vec<ReleaseRecord> {
        let (Some(base), Some(api_key)) = (self.base_url.as_deref(), self.api_key.as_deref())
        else {
            return vec![];
        };

        let categories = MUSIC_CATEGORIES
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let result = self
            .client
            .get(format!("{base}/api/v1/search"))
            .header("X-Api-Key", api_key)
            .query(&[("query", query), ("categories", &categories), ("type", "search")])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<Vec<SearchResultDto>>().await {
                Ok(parsed) => parsed.into_iter().filter_map(normalize).collect(),
                Err(e) => {
                    warn!(error = %e, "prowlarr search parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "prowlarr search request failed");
                vec![]
            }
        }
    }

    /// Runs [`search`] for `"{artist} {album}"` and applies `scorer` to each
    /// release, producing `{record, score, passes_text_relevance}` triples.
    pub async fn search_album(
        &self,
        artist: &str,
        album: &str,
        scorer: impl Fn(&ReleaseRecord) -> (f64, bool),
    ) -> Vec<ScoredRelease> {
        self.search(&format!("{artist} {album}"))
            .await
            .into_iter()
            .map(|release| {
                let (score, passes_text_relevance) = scorer(&release);
                ScoredRelease {
                    release,
                    score,
                    passes_text_relevance,
                }
            })
            .collect()
    }

    pub async fn grab(&self, guid: &str, indexer_id: i32) -> GrabResult {
        let (Some(base), Some(api_key)) = (self.base_url.as_deref(), self.api_key.as_deref())
        else {
            return GrabResult {
                success: false,
                download_id: None,
            };
        };

        let result = self
            .client
            .post(format!("{base}/api/v1/search"))
            .header("X-Api-Key", api_key)
            .json(&serde_json::json!({"guid": guid, "indexerId": indexer_id}))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<GrabResponseDto>().await {
                    Ok(parsed) => GrabResult {
                        success: true,
                        download_id: parsed.id.map(|id| id.to_string()),
                    },
                    Err(_) => GrabResult {
                        success: true,
                        download_id: None,
                    },
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "prowlarr grab rejected");
                GrabResult {
                    success: false,
                    download_id: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "prowlarr grab request failed");
                GrabResult {
                    success: false,
                    download_id: None,
                }
            }
        }
    }
}

fn normalize(dto: SearchResultDto) -> Option<ReleaseRecord> {
    let protocol = match dto.protocol.as_str() {
        "torrent" => Protocol::Torrent,
        "usenet" => Protocol::Usenet,
        other => {
            warn!(protocol = other, "prowlarr returned unknown protocol, skipping");
            return None;
        }
    };

    Some(ReleaseRecord {
        guid: dto.guid,
        indexer_id: dto.indexer_id,
        title: dto.title,
        size_bytes: dto.size,
        seeders: dto.seeders,
        leechers: dto.leechers,
        protocol,
        download_url: dto.download_url.unwrap_or_default(),
        info_url: dto.info_url,
        publish_date: dto.publish_date,
        categories: dto.categories.into_iter().map(|c| c.id).collect(),
    })
}
