//! Persistence for listening events (the affinity engine's raw input).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::listening_event::ListeningEvent;

#[derive(Clone)]
pub struct ListeningEventRepository {
    pool: PgPool,
}

impl ListeningEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, event: &ListeningEvent) -> Result<ListeningEvent> {
        Ok(sqlx::query_as::<_, ListeningEvent>(
            r#"
            INSERT INTO listening_events (
                id, user_id, track_id, album_id, artist_id, media_server_track_key,
                played_at, play_duration_seconds, track_duration_seconds,
                completion_percent, skipped, source, device, player, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now()
            )
            RETURNING *
            "#,
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.track_id)
        .bind(event.album_id)
        .bind(event.artist_id)
        .bind(&event.media_server_track_key)
        .bind(event.played_at)
        .bind(event.play_duration_seconds)
        .bind(event.track_duration_seconds)
        .bind(event.completion_percent)
        .bind(event.skipped)
        .bind(&event.source)
        .bind(&event.device)
        .bind(&event.player)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ListeningEvent>> {
        Ok(sqlx::query_as::<_, ListeningEvent>(
            "SELECT * FROM listening_events WHERE user_id = $1 AND played_at >= $2 ORDER BY played_at",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn latest_played_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        Ok(sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(played_at) FROM listening_events WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn count_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM listening_events WHERE user_id = $1 AND played_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?)
    }
}
