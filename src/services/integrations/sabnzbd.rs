//! SABnzbd client. Single API-key query-string auth; all operations go
//! through the `api.cgi` endpoint's `mode` parameter.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub struct SabnzbdClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueSlot {
    pub nzo_id: String,
    pub filename: String,
    pub status: String,
    pub percentage: String,
    pub mb: String,
    pub mbleft: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistorySlot {
    pub nzo_id: String,
    pub name: String,
    pub status: String,
    pub storage: String,
    pub fail_message: String,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    queue: QueueInner,
}

#[derive(Debug, Deserialize)]
struct QueueInner {
    #[serde(default)]
    slots: Vec<QueueSlot>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: HistoryInner,
}

#[derive(Debug, Deserialize)]
struct HistoryInner {
    #[serde(default)]
    slots: Vec<HistorySlot>,
}

impl SabnzbdClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            base_url,
            api_key,
        }
    }

    pub fn is_available(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }

    fn endpoint(&self) -> Option<(&str, &str)> {
        Some((self.base_url.as_deref()?, self.api_key.as_deref()?))
    }

    /// Returns the assigned nzo id, or `None` on any failure.
    pub async fn add_nzb_url(&self, url: &str, category: Option<&str>, name: Option<&str>) -> Option<String> {
        let (base, api_key) = self.endpoint()?;

        let mut query = vec![
            ("mode", "addurl"),
            ("name", url),
            ("apikey", api_key),
            ("output", "json"),
        ];
        if let Some(category) = category {
            query.push(("cat", category));
        }
        if let Some(name) = name {
            query.push(("nzbname", name));
        }

        let result = self
            .client
            .get(format!("{base}/api"))
            .query(&query)
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<AddResponse>().await {
                Ok(parsed) if parsed.status => parsed.nzo_ids.into_iter().next(),
                Ok(_) => {
                    warn!("sabnzbd rejected add_nzb_url");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "sabnzbd add-nzb parse failed");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "sabnzbd add-nzb request failed");
                None
            }
        }
    }

    pub async fn queue(&self) -> Vec<QueueSlot> {
        let Some((base, api_key)) = self.endpoint() else { return vec![] };

        let result = self
            .client
            .get(format!("{base}/api"))
            .query(&[("mode", "queue"), ("apikey", api_key), ("output", "json")])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<QueueResponse>().await {
                Ok(parsed) => parsed.queue.slots,
                Err(e) => {
                    warn!(error = %e, "sabnzbd queue parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "sabnzbd queue request failed");
                vec![]
            }
        }
    }

    pub async fn history(&self) -> Vec<HistorySlot> {
        let Some((base, api_key)) = self.endpoint() else { return vec![] };

        let result = self
            .client
            .get(format!("{base}/api"))
            .query(&[("mode", "history"), ("apikey", api_key), ("output", "json")])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<HistoryResponse>().await {
                Ok(parsed) => parsed.history.slots,
                Err(e) => {
                    warn!(error = %e, "sabnzbd history parse failed");
                    vec![]
                }
            },
            Err(e) => {
                warn!(error = %e, "sabnzbd history request failed");
                vec![]
            }
        }
    }

    pub async fn pause(&self, nzo_id: &str) -> bool {
        self.queue_action("queue", nzo_id).await
    }

    pub async fn resume(&self, nzo_id: &str) -> bool {
        self.queue_action("resume", nzo_id).await
    }

    pub async fn delete(&self, nzo_id: &str, del_files: bool) -> bool {
        let Some((base, api_key)) = self.endpoint() else { return false };

        let result = self
            .client
            .get(format!("{base}/api"))
            .query(&[
                ("mode", "queue"),
                ("name", "delete"),
                ("value", nzo_id),
                ("del_files", if del_files { "1" } else { "0" }),
                ("apikey", api_key),
                ("output", "json"),
            ])
            .send()
            .await;

        result.map(|r| r.status().is_success()).unwrap_or(false)
    }

    async fn queue_action(&self, name: &str, nzo_id: &str) -> bool {
        let Some((base, api_key)) = self.endpoint() else { return false };

        let result = self
            .client
            .get(format!("{base}/api"))
            .query(&[
                ("mode", "queue"),
                ("name", name),
                ("value", nzo_id),
                ("apikey", api_key),
                ("output", "json"),
            ])
            .send()
            .await;

        result.map(|r| r.status().is_success()).unwrap_or(false)
    }

    /// Removes a completed download from history, optionally with its files.
    pub async fn delete_history(&self, nzo_id: &str, del_files: bool) -> bool {
        let Some((base, api_key)) = self.endpoint() else { return false };

        let result = self
            .client
            .get(format!("{base}/api"))
            .query(&[
                ("mode", "history"),
                ("name", "delete"),
                ("value", nzo_id),
                ("del_files", if del_files { "1" } else { "0" }),
                ("apikey", api_key),
                ("output", "json"),
            ])
            .send()
            .await;

        result.map(|r| r.status().is_success()).unwrap_or(false)
    }
}
