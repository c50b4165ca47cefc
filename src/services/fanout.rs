//! Event fan-out (§4.H): an in-process publish/subscribe broadcaster. Each
//! download-pipeline state transition publishes a JSON event on the
//! `download_updates` Redis channel; a single background subscriber reads
//! that channel and forwards every message to whichever push clients are
//! currently registered. No replay, no history — a client only sees events
//! published after it registers.

use std::sync::Arc;

use deadpool_redis::Pool as RedisPool;
use futures::StreamExt;
use redis::AsyncCommands;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::models::download::Download;

pub const DOWNLOAD_UPDATES_CHANNEL: &str = "download_updates";

/// Backoff between subscriber reconnect attempts if the Redis connection
/// drops or the initial connect fails.
const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

#[derive(serde::Serialize)]
struct DownloadUpdateEvent<'a> {
    download_id: uuid::Uuid,
    status: &'a str,
    artist_name: &'a str,
    album_title: &'a str,
    progress_percent: Option<f64>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl<'a> From<&'a Download> for DownloadUpdateEvent<'a> {
    fn from(download: &'a Download) -> Self {
        Self {
            download_id: download.id,
            status: status_str(download.status),
            artist_name: &download.artist_name,
            album_title: &download.album_title,
            progress_percent: download.progress_percent,
            updated_at: download.updated_at,
        }
    }
}

fn status_str(status: crate::models::download::DownloadStatus) -> &'static str {
    use crate::models::download::DownloadStatus::*;
    match status {
        Pending => "pending",
        Searching => "searching",
        Found => "found",
        Queued => "queued",
        Downloading => "downloading",
        Importing => "importing",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

type Client = mpsc::UnboundedSender<String>;

/// Cheaply cloneable handle shared across handlers, the download pipeline,
/// and the background subscriber task.
#[derive(Clone)]
pub struct Fanout {
    redis: RedisPool,
    redis_url: String,
    clients: Arc<Mutex<Vec<Client>>>,
}

impl Fanout {
    pub fn new(redis: RedisPool, redis_url: String) -> Self {
        Self {
            redis,
            redis_url,
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Publishes a download's current state to the Redis channel. Actual
    /// delivery to push clients happens in `run`, even within this process.
    pub async fn publish_download_update(&self, download: &Download) {
        let event = DownloadUpdateEvent::from(download);
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "fanout: could not serialize download update");
                return;
            }
        };
        self.publish(&payload).await;
    }

    async fn publish(&self, payload: &str) {
        let mut conn = match self.redis.get().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "fanout: redis pool unavailable for publish");
                return;
            }
        };
        if let Err(e) = conn
            .publish::<_, _, ()>(DOWNLOAD_UPDATES_CHANNEL, payload)
            .await
        {
            warn!(error = %e, "fanout: publish failed");
        }
    }

    /// Registers a new push client (e.g. one end of a websocket); the
    /// returned receiver yields every event published from here on.
    pub async fn register(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.lock().await.push(tx);
        rx
    }

    /// Broadcasts one message to every registered client, dropping any whose
    /// receiver has gone away. Holds the lock only for the send loop.
    async fn broadcast(&self, payload: String) {
        let mut clients = self.clients.lock().await;
        clients.retain(|client| client.send(payload.clone()).is_ok());
    }

    /// Long-running task: owns a dedicated (non-pooled) Redis connection
    /// subscribed to `download_updates` and forwards every message it
    /// receives. Reconnects with a fixed backoff if the connection drops.
    pub async fn run(&self) {
        loop {
            if let Err(e) = self.subscribe_and_forward().await {
                warn!(error = %e, "fanout: subscriber connection lost, reconnecting");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn subscribe_and_forward(&self) -> redis::RedisResult<()> {
        let client = redis::Client::open(self.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(DOWNLOAD_UPDATES_CHANNEL).await?;
        debug!(channel = DOWNLOAD_UPDATES_CHANNEL, "fanout: subscriber connected");

        let mut stream = pubsub.on_message();
        while let Some(message) = stream.next().await {
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "fanout: undecodable message payload");
                    continue;
                }
            };
            self.broadcast(payload).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_download() -> Download {
        Download {
            id: uuid::Uuid::new_v4(),
            wishlist_item_id: None,
            status: crate::models::download::DownloadStatus::Downloading,
            source: crate::models::download::DownloadSource::Manual,
            artist_name: "Boards of Canada".to_string(),
            album_title: "Music Has the Right to Children".to_string(),
            release_title: None,
            size_bytes: None,
            format: None,
            quality: None,
            seeders: None,
            leechers: None,
            protocol: None,
            indexer_id: None,
            search_score: None,
            download_client: None,
            client_job_id: None,
            progress_percent: Some(42.0),
            speed_bytes_per_sec: None,
            eta_seconds: None,
            final_path: None,
            beets_imported: false,
            failure_reason: None,
            started_at: None,
            completed_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn event_serializes_status_as_lowercase_string() {
        let download = sample_download();
        let event = DownloadUpdateEvent::from(&download);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "downloading");
        assert_eq!(json["progress_percent"], 42.0);
    }

    #[tokio::test]
    async fn broadcast_prunes_dropped_receivers() {
        let fanout = Fanout::new(
            deadpool_redis::Config::from_url("redis://localhost:6379")
                .create_pool(Some(deadpool_redis::Runtime::Tokio1))
                .unwrap(),
            "redis://localhost:6379".to_string(),
        );
        let rx = fanout.register().await;
        drop(rx);
        fanout.broadcast("hello".to_string()).await;
        assert!(fanout.clients.lock().await.is_empty());
    }
}
