use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListeningEvent {
    pub id: Uuid,
    pub user_id: Uuid,

    pub track_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub artist_id: Option<Uuid>,
    pub media_server_track_key: Option<String>,

    pub played_at: DateTime<Utc>,
    pub play_duration_seconds: i32,
    pub track_duration_seconds: Option<i32>,
    pub completion_percent: f64,
    pub skipped: bool,

    pub source: String,
    pub device: Option<String>,
    pub player: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ListeningEvent {
    pub fn hour_of_day(&self) -> u32 {
        self.played_at.hour()
    }

    /// 0 = Monday .. 6 = Sunday, matching chrono's `Weekday::num_days_from_monday`.
    pub fn day_of_week(&self) -> u32 {
        self.played_at.weekday().num_days_from_monday()
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.played_at).num_seconds() as f64 / 86_400.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordListeningEventRequest {
    pub track_id: Option<Uuid>,
    pub album_id: Option<Uuid>,
    pub artist_id: Option<Uuid>,
    pub media_server_track_key: Option<String>,
    pub played_at: DateTime<Utc>,
    pub play_duration_seconds: i32,
    pub track_duration_seconds: Option<i32>,
    pub skipped: bool,
    pub source: String,
    pub device: Option<String>,
    pub player: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(played_at: DateTime<Utc>) -> ListeningEvent {
        ListeningEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            track_id: None,
            album_id: None,
            artist_id: None,
            media_server_track_key: None,
            played_at,
            play_duration_seconds: 180,
            track_duration_seconds: Some(200),
            completion_percent: 90.0,
            skipped: false,
            source: "plex".to_string(),
            device: None,
            player: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn derives_hour_and_weekday() {
        // 2026-01-26 is a Monday.
        let played_at = Utc.with_ymd_and_hms(2026, 1, 26, 14, 30, 0).unwrap();
        let event = sample(played_at);
        assert_eq!(event.hour_of_day(), 14);
        assert_eq!(event.day_of_week(), 0);
    }
}
