//! Persistence for recommendations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::recommendation::{Recommendation, RecommendationCategory, ScoredCandidate};

#[derive(Clone)]
pub struct RecommendationRepository {
    pool: PgPool,
}

impl RecommendationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Invariant 3: only non-expired, non-dismissed recommendations surface.
    pub async fn active_for_user(
        &self,
        user_id: Uuid,
        category: Option<RecommendationCategory>,
        limit: i64,
    ) -> Result<Vec<Recommendation>> {
        let rows = if let Some(category) = category {
            sqlx::query_as::<_, Recommendation>(
                r#"
                SELECT * FROM recommendations
                WHERE user_id = $1 AND category = $2 AND expires_at > now() AND dismissed_at IS NULL
                ORDER BY relevance DESC, confidence DESC
                LIMIT $3
                "#,
            )
            .bind(user_id)
            .bind(category)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Recommendation>(
                r#"
                SELECT * FROM recommendations
                WHERE user_id = $1 AND expires_at > now() AND dismissed_at IS NULL
                ORDER BY relevance DESC, confidence DESC
                LIMIT $2
                "#,
            )
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows)
    }

    /// Persists a batch of already-scored, already-diversified candidates
    /// under one expiration, replacing expired recommendations before
    /// accumulating the table indefinitely.
    pub async fn persist_batch(
        &self,
        user_id: Uuid,
        candidates: &[ScoredCandidate],
        ttl_days: i64,
    ) -> Result<Vec<Recommendation>> {
        let mut tx = self.pool.begin().await?;
        let expires_at = Utc::now() + chrono::Duration::days(ttl_days);
        let mut persisted = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let factors = serde_json::to_value(&candidate.factors).unwrap_or(serde_json::json!({}));
            let row = sqlx::query_as::<_, Recommendation>(
                r#"
                INSERT INTO recommendations (
                    id, user_id, recommendation_type, category, artist_id, album_id, track_id,
                    basis_artist_id, basis_album_id, reason, reason_bullets, confidence,
                    relevance, novelty, factors, playlist_group, created_at, expires_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, now(), $17
                )
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(candidate.recommendation_type)
            .bind(candidate.category)
            .bind(candidate.artist_id)
            .bind(candidate.album_id)
            .bind(candidate.track_id)
            .bind(candidate.basis_artist_id)
            .bind(candidate.basis_album_id)
            .bind(&candidate.reason)
            .bind(&candidate.reason_bullets)
            .bind(candidate.confidence)
            .bind(candidate.relevance)
            .bind(candidate.novelty)
            .bind(factors)
            .bind(Option::<String>::None)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;
            persisted.push(row);
        }

        tx.commit().await?;
        Ok(persisted)
    }

    /// Run before each rebuild so the table doesn't accumulate indefinitely.
    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM recommendations WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn dismiss(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE recommendations SET dismissed_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_shown(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE recommendations SET shown_at = COALESCE(shown_at, now()) WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_clicked(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE recommendations SET clicked_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Used by the `add_to_playlist` rule action to group a recommendation
    /// under a playlist without a dedicated playlist entity.
    pub async fn set_playlist_group(&self, id: Uuid, playlist_group: &str) -> Result<()> {
        sqlx::query("UPDATE recommendations SET playlist_group = $2 WHERE id = $1")
            .bind(id)
            .bind(playlist_group)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Recommendation> {
        sqlx::query_as::<_, Recommendation>("SELECT * FROM recommendations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("recommendation {id}")))
    }
}
