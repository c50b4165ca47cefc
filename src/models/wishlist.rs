use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WishlistItemType {
    Artist,
    Album,
    Track,
    Playlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WishlistStatus {
    Wanted,
    Searching,
    Found,
    Downloading,
    Importing,
    Downloaded,
    Failed,
}

impl WishlistStatus {
    /// Statuses a retry can be initiated from; anything further along in the
    /// pipeline (or already terminal-success) is not retryable.
    pub fn is_retryable(self) -> bool {
        matches!(self, WishlistStatus::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WishlistStatus::Downloaded | WishlistStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WishlistPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WishlistSource {
    Manual,
    Recommendation,
    Automation,
    ReleaseRadar,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: WishlistItemType,
    pub status: WishlistStatus,
    pub priority: WishlistPriority,
    pub source: WishlistSource,

    pub artist_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub artist_name: Option<String>,
    pub album_title: Option<String>,

    pub musicbrainz_id: Option<String>,
    pub spotify_id: Option<String>,

    pub confidence: Option<f64>,
    pub preferred_format: Option<String>,
    pub auto_download: bool,

    pub last_searched_at: Option<DateTime<Utc>>,
    pub search_count: i32,
    pub failure_reason: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWishlistItemRequest {
    pub item_type: WishlistItemType,
    pub artist_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub artist_name: Option<String>,
    pub album_title: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub spotify_id: Option<String>,
    pub priority: Option<WishlistPriority>,
    pub source: WishlistSource,
    pub preferred_format: Option<String>,
    pub auto_download: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failed_is_retryable() {
        assert!(WishlistStatus::Failed.is_retryable());
        assert!(!WishlistStatus::Searching.is_retryable());
        assert!(!WishlistStatus::Downloaded.is_retryable());
    }

    #[test]
    fn terminal_statuses() {
        assert!(WishlistStatus::Downloaded.is_terminal());
        assert!(WishlistStatus::Failed.is_terminal());
        assert!(!WishlistStatus::Downloading.is_terminal());
    }

    #[test]
    fn priority_orders_low_to_high() {
        assert!(WishlistPriority::Low < WishlistPriority::Normal);
        assert!(WishlistPriority::Normal < WishlistPriority::High);
    }
}
