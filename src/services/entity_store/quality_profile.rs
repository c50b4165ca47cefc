//! Persistence for quality profiles.
//!
//! Invariant 4: at most one profile is default per user; the default
//! profile cannot be deleted.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::quality_profile::QualityProfile;

#[derive(Clone)]
pub struct QualityProfileRepository {
    pool: PgPool,
}

impl QualityProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<QualityProfile> {
        sqlx::query_as::<_, QualityProfile>("SELECT * FROM quality_profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("quality profile {id}")))
    }

    /// The first profile a user creates becomes their default (invariant 4).
    pub async fn create(
        &self,
        user_id: Uuid,
        name: &str,
        preferred_formats: &[String],
        min_quality: &str,
        max_size_mb: Option<i32>,
        min_seeders: i32,
    ) -> Result<QualityProfile> {
        let is_default = self.default_for_user(user_id).await?.is_none();
        Ok(sqlx::query_as::<_, QualityProfile>(
            r#"
            INSERT INTO quality_profiles (
                id, user_id, name, preferred_formats, min_quality, max_size_mb, min_seeders,
                release_type_preference, format_match_weight, seeder_weight, is_default,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, '{}', 0.6, 0.4, $8, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(preferred_formats)
        .bind(min_quality)
        .bind(max_size_mb)
        .bind(min_seeders)
        .bind(is_default)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<QualityProfile>> {
        Ok(sqlx::query_as::<_, QualityProfile>(
            "SELECT * FROM quality_profiles WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn default_for_user(&self, user_id: Uuid) -> Result<Option<QualityProfile>> {
        Ok(sqlx::query_as::<_, QualityProfile>(
            "SELECT * FROM quality_profiles WHERE user_id = $1 AND is_default = true LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Setting a profile default clears any other default for the same user
    /// in the same transaction.
    pub async fn set_default(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE quality_profiles SET is_default = false WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE quality_profiles SET is_default = true, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let profile = sqlx::query_as::<_, QualityProfile>("SELECT * FROM quality_profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("quality profile {id}")))?;

        if profile.is_default {
            return Err(AppError::invalid(
                "quality_profile",
                "the default quality profile cannot be deleted",
            ));
        }

        sqlx::query("DELETE FROM quality_profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
