use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Searching,
    Found,
    Queued,
    Downloading,
    Importing,
    Completed,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DownloadSource {
    Manual,
    Auto,
    Wishlist,
    Automation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DownloadProtocol {
    Torrent,
    Usenet,
}

/// Holds only a weak reference (`wishlist_item_id`) back to its originating
/// wishlist item; deleting the wishlist item detaches but does not delete
/// the download.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Download {
    pub id: Uuid,
    pub wishlist_item_id: Option<Uuid>,
    pub status: DownloadStatus,
    pub source: DownloadSource,

    pub artist_name: String,
    pub album_title: String,

    pub release_title: Option<String>,
    pub size_bytes: Option<i64>,
    pub format: Option<String>,
    pub quality: Option<String>,
    pub seeders: Option<i32>,
    pub leechers: Option<i32>,
    pub protocol: Option<DownloadProtocol>,

    pub indexer_id: Option<String>,
    pub search_score: Option<f64>,

    pub download_client: Option<String>,
    pub client_job_id: Option<String>,

    pub progress_percent: Option<f64>,
    pub speed_bytes_per_sec: Option<i64>,
    pub eta_seconds: Option<i64>,

    pub final_path: Option<String>,
    pub beets_imported: bool,
    pub failure_reason: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(DownloadStatus::Cancelled.is_terminal());
        assert!(!DownloadStatus::Downloading.is_terminal());
    }
}
