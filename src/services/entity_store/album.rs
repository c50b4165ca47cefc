//! Persistence for albums.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::album::{Album, AlbumType, ReleaseType};

#[derive(Clone)]
pub struct AlbumRepository {
    pool: PgPool,
}

impl AlbumRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Album> {
        sqlx::query_as::<_, Album>("SELECT * FROM albums WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("album {id}")))
    }

    pub async fn list_for_artist(&self, artist_id: Uuid) -> Result<Vec<Album>> {
        Ok(sqlx::query_as::<_, Album>(
            "SELECT * FROM albums WHERE artist_id = $1 ORDER BY release_date DESC NULLS LAST",
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn released_since(&self, since: NaiveDate, limit: i64) -> Result<Vec<Album>> {
        Ok(sqlx::query_as::<_, Album>(
            "SELECT * FROM albums WHERE release_date >= $1 ORDER BY release_date DESC LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn find_by_artist_and_title(
        &self,
        artist_id: Uuid,
        title: &str,
    ) -> Result<Option<Album>> {
        Ok(sqlx::query_as::<_, Album>(
            "SELECT * FROM albums WHERE artist_id = $1 AND LOWER(title) = LOWER($2) LIMIT 1",
        )
        .bind(artist_id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn upsert(
        &self,
        artist_id: Uuid,
        title: &str,
        album_type: AlbumType,
        release_type: ReleaseType,
        release_date: Option<NaiveDate>,
        musicbrainz_release_group_id: Option<&str>,
    ) -> Result<Album> {
        if let Some(existing) = self.find_by_artist_and_title(artist_id, title).await? {
            return Ok(existing);
        }

        Ok(sqlx::query_as::<_, Album>(
            r#"
            INSERT INTO albums (
                id, title, artist_id, album_type, release_type,
                musicbrainz_release_group_id, release_date, release_year,
                in_library, cover_urls, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, false, '{}', now(), now()
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(artist_id)
        .bind(album_type)
        .bind(release_type)
        .bind(musicbrainz_release_group_id)
        .bind(release_date)
        .bind(release_date.map(|d| d.format("%Y").to_string().parse::<i32>().unwrap_or_default()))
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn mark_in_library(
        &self,
        id: Uuid,
        format: &str,
        bitrate: Option<i32>,
        sample_rate: Option<i32>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE albums SET
                in_library = true, format = $2, bitrate = $3, sample_rate = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(format)
        .bind(bitrate)
        .bind(sample_rate)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
