//! Persistence for explicit user preferences.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::preference::{PreferenceKind, UserPreference};

#[derive(Clone)]
pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserPreference>> {
        Ok(
            sqlx::query_as::<_, UserPreference>("SELECT * FROM user_preferences WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn list_by_kind(
        &self,
        user_id: Uuid,
        kind: PreferenceKind,
    ) -> Result<Vec<UserPreference>> {
        Ok(sqlx::query_as::<_, UserPreference>(
            "SELECT * FROM user_preferences WHERE user_id = $1 AND kind = $2",
        )
        .bind(user_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn upsert(
        &self,
        user_id: Uuid,
        kind: PreferenceKind,
        key: &str,
        value: f64,
        weight: f64,
        confidence: f64,
    ) -> Result<UserPreference> {
        Ok(sqlx::query_as::<_, UserPreference>(
            r#"
            INSERT INTO user_preferences (id, user_id, kind, key, value, weight, confidence, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
            ON CONFLICT (user_id, kind, key) DO UPDATE SET
                value = EXCLUDED.value, weight = EXCLUDED.weight, confidence = EXCLUDED.confidence,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(key)
        .bind(value)
        .bind(weight)
        .bind(confidence)
        .fetch_one(&self.pool)
        .await?)
    }
}
