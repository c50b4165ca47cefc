//! Persistence for taste profiles.
//!
//! Invariant 5: a profile is monotonically versioned per user; writing a
//! new profile increments the version rather than overwriting history.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::taste_profile::TasteProfile;

#[derive(Clone)]
pub struct TasteProfileRepository {
    pool: PgPool,
}

impl TasteProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn latest(&self, user_id: Uuid) -> Result<Option<TasteProfile>> {
        Ok(sqlx::query_as::<_, TasteProfile>(
            "SELECT * FROM taste_profiles WHERE user_id = $1 ORDER BY version DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Inserts `profile` at `previous_version + 1`, carrying over an
    /// evolution history the caller has already appended to and trimmed.
    pub async fn save_new_version(&self, mut profile: TasteProfile) -> Result<TasteProfile> {
        let next_version = self
            .latest(profile.user_id)
            .await?
            .map(|p| p.version + 1)
            .unwrap_or(1);
        profile.version = next_version;

        Ok(sqlx::query_as::<_, TasteProfile>(
            r#"
            INSERT INTO taste_profiles (
                id, user_id, version, top_genres, preferred_decades, mean_danceability,
                mean_energy, mean_valence, mean_tempo, total_plays, total_artists,
                total_albums, total_tracks, peak_hours, peak_days, novelty_preference,
                profile_data, computed_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, now()
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(profile.user_id)
        .bind(profile.version)
        .bind(&profile.top_genres)
        .bind(&profile.preferred_decades)
        .bind(profile.mean_danceability)
        .bind(profile.mean_energy)
        .bind(profile.mean_valence)
        .bind(profile.mean_tempo)
        .bind(profile.total_plays)
        .bind(profile.total_artists)
        .bind(profile.total_albums)
        .bind(profile.total_tracks)
        .bind(&profile.peak_hours)
        .bind(&profile.peak_days)
        .bind(profile.novelty_preference)
        .bind(&profile.profile_data)
        .fetch_one(&self.pool)
        .await?)
    }
}
