use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    Album,
    Single,
    Ep,
    Compilation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Studio,
    Live,
    Remix,
    Soundtrack,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Album {
    pub id: Uuid,
    pub title: String,
    pub artist_id: Uuid,

    pub album_type: AlbumType,
    pub release_type: ReleaseType,

    pub musicbrainz_release_group_id: Option<String>,
    pub musicbrainz_release_id: Option<String>,
    pub spotify_id: Option<String>,
    pub discogs_id: Option<String>,

    pub release_date: Option<NaiveDate>,
    pub release_year: Option<i32>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub country: Option<String>,

    pub total_tracks: Option<i32>,
    pub total_discs: Option<i32>,
    pub duration_seconds: Option<i32>,

    pub mean_danceability: Option<f64>,
    pub mean_energy: Option<f64>,
    pub mean_valence: Option<f64>,
    pub mean_tempo: Option<f64>,

    pub spotify_popularity: Option<i32>,

    pub in_library: bool,
    pub format: Option<String>,
    pub bitrate: Option<i32>,
    pub sample_rate: Option<i32>,
    pub bit_depth: Option<i32>,

    pub cover_urls: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumWithArtist {
    #[serde(flatten)]
    pub album: Album,
    pub artist_name: String,
}

/// Is `release_date` within the last `window_days`? Used by the release-radar
/// recommendation job.
pub fn is_recent_release(release_date: NaiveDate, today: NaiveDate, window_days: i64) -> bool {
    (today - release_date).num_days() <= window_days && release_date <= today
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_release_within_window() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let release = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert!(is_recent_release(release, today, 30));
    }

    #[test]
    fn release_outside_window_is_not_recent() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 30).unwrap();
        let release = NaiveDate::from_ymd_opt(2025, 11, 1).unwrap();
        assert!(!is_recent_release(release, today, 30));
    }
}
