//! qBittorrent WebUI client. Authenticates into a cookie session (qBittorrent
//! has no token auth), then drives torrent lifecycle over its JSON API.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::warn;

use super::common::normalize_release_title;

pub struct QbittorrentClient {
    client: Client,
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    authenticated: RwLock<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,
    pub name: String,
    pub state: String,
    pub progress: f64,
    pub dlspeed: i64,
    pub eta: i64,
    pub category: String,
    pub content_path: Option<String>,
}

impl QbittorrentClient {
    pub fn new(base_url: Option<String>, username: Option<String>, password: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .cookie_store(true)
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client"),
            base_url,
            username,
            password,
            authenticated: RwLock::new(false),
        }
    }

    pub fn is_available(&self) -> bool {
        self.base_url.is_some()
    }

    fn base(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    async fn ensure_session(&self) -> bool {
        if *self.authenticated.read().await {
            return true;
        }
        let (Some(base), Some(username), Some(password)) =
            (self.base(), self.username.as_deref(), self.password.as_deref())
        else {
            return false;
        };

        let result = self
            .client
            .post(format!("{base}/api/v2/auth/login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await;

        match result {
            Ok(response) => match response.text().await {
                Ok(body) if body.trim().eq_ignore_ascii_case("ok.") => {
                    *self.authenticated.write().await = true;
                    true
                }
                Ok(body) => {
                    warn!(body, "qbittorrent login did not return the normalized 'ok' body");
                    false
                }
                Err(e) => {
                    warn!(error = %e, "qbittorrent login response unreadable");
                    false
                }
            },
            Err(e) => {
                warn!(error = %e, "qbittorrent login request failed");
                false
            }
        }
    }

    /// Idempotent: both 200 and 409 (category already exists) count as success.
    pub async fn ensure_category(&self, category: &str, save_path: &str) -> bool {
        let Some(base) = self.base() else { return false };
        if !self.ensure_session().await {
            return false;
        }

        let result = self
            .client
            .post(format!("{base}/api/v2/torrents/createCategory"))
            .form(&[("category", category), ("savePath", save_path)])
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                status.is_success() || status == StatusCode::CONFLICT
            }
            Err(e) => {
                warn!(error = %e, "qbittorrent category creation request failed");
                false
            }
        }
    }

    pub async fn add_torrent_url(
        &self,
        url: &str,
        category: Option<&str>,
        save_path: Option<&str>,
        tags: Option<&str>,
    ) -> bool {
        let Some(base) = self.base() else { return false };
        if !self.ensure_session().await {
            return false;
        }

        let mut form = vec![("urls", url)];
        if let Some(category) = category {
            form.push(("category", category));
        }
        if let Some(save_path) = save_path {
            form.push(("savepath", save_path));
        }
        if let Some(tags) = tags {
            form.push(("tags", tags));
        }

        let result = self
            .client
            .post(format!("{base}/api/v2/torrents/add"))
            .form(&form)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "qbittorrent add-torrent request failed");
                false
            }
        }
    }

    pub async fn get_torrents(&self, category: Option<&str>) -> Vec<TorrentInfo> {
        let Some(base) = self.base() else { return vec![] };
        if !self.ensure_session().await {
            return vec![];
        }

        let mut query = vec![];
        if let Some(category) = category {
            query.push(("category", category));
        }

        let result = self
            .client
            .get(format!("{base}/api/v2/torrents/info"))
            .query(&query)
            .send()
            .await;

        match result {
            Ok(response) => response.json::<Vec<TorrentInfo>>().await.unwrap_or_else(|e| {
                warn!(error = %e, "qbittorrent torrent list parse failed");
                vec![]
            }),
            Err(e) => {
                warn!(error = %e, "qbittorrent torrent list request failed");
                vec![]
            }
        }
    }

    pub async fn get_torrent(&self, hash: &str) -> Option<TorrentInfo> {
        self.get_torrents(None)
            .await
            .into_iter()
            .find(|t| t.hash.eq_ignore_ascii_case(hash))
    }

    pub async fn pause(&self, hash: &str) -> bool {
        self.action("pause", hash).await
    }

    pub async fn resume(&self, hash: &str) -> bool {
        self.action("resume", hash).await
    }

    pub async fn delete(&self, hash: &str, delete_files: bool) -> bool {
        let Some(base) = self.base() else { return false };
        if !self.ensure_session().await {
            return false;
        }

        let result = self
            .client
            .post(format!("{base}/api/v2/torrents/delete"))
            .form(&[("hashes", hash), ("deleteFiles", if delete_files { "true" } else { "false" })])
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "qbittorrent delete request failed");
                false
            }
        }
    }

    async fn action(&self, action: &str, hash: &str) -> bool {
        let Some(base) = self.base() else { return false };
        if !self.ensure_session().await {
            return false;
        }

        let result = self
            .client
            .post(format!("{base}/api/v2/torrents/{action}"))
            .form(&[("hashes", hash)])
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, action, "qbittorrent torrent action request failed");
                false
            }
        }
    }

    /// Polls the torrent list until one whose normalized name matches
    /// `expected_title`, or `timeout` elapses.
    pub async fn find_torrent_hash(
        &self,
        expected_title: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Option<String> {
        let target = normalize_release_title(expected_title);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let torrents = self.get_torrents(None).await;
            if let Some(found) = torrents
                .iter()
                .find(|t| normalize_release_title(&t.name) == target)
            {
                return Some(found.hash.clone());
            }

            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            sleep(interval).await;
        }
    }
}
