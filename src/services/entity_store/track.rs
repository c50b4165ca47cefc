//! Persistence for tracks.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::track::Track;

#[derive(Clone)]
pub struct TrackRepository {
    pool: PgPool,
}

impl TrackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Track> {
        sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("track {id}")))
    }

    pub async fn list_for_album(&self, album_id: Uuid) -> Result<Vec<Track>> {
        Ok(sqlx::query_as::<_, Track>(
            "SELECT * FROM tracks WHERE album_id = $1 ORDER BY disc_number, track_number",
        )
        .bind(album_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list_in_library_for_artist(&self, artist_id: Uuid) -> Result<Vec<Track>> {
        Ok(sqlx::query_as::<_, Track>(
            r#"
            SELECT t.* FROM tracks t
            JOIN albums a ON a.id = t.album_id
            WHERE a.artist_id = $1 AND t.in_library = true
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn insert(&self, track: &Track) -> Result<Track> {
        Ok(sqlx::query_as::<_, Track>(
            r#"
            INSERT INTO tracks (
                id, title, album_id, disc_number, track_number, musicbrainz_id,
                spotify_id, isrc, duration_seconds, danceability, energy, key,
                loudness, mode, speechiness, acousticness, instrumentalness,
                liveness, valence, tempo, time_signature, spotify_popularity,
                in_library, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, now(), now()
            )
            RETURNING *
            "#,
        )
        .bind(track.id)
        .bind(&track.title)
        .bind(track.album_id)
        .bind(track.disc_number)
        .bind(track.track_number)
        .bind(&track.musicbrainz_id)
        .bind(&track.spotify_id)
        .bind(&track.isrc)
        .bind(track.duration_seconds)
        .bind(track.danceability)
        .bind(track.energy)
        .bind(track.key)
        .bind(track.loudness)
        .bind(track.mode)
        .bind(track.speechiness)
        .bind(track.acousticness)
        .bind(track.instrumentalness)
        .bind(track.liveness)
        .bind(track.valence)
        .bind(track.tempo)
        .bind(track.time_signature)
        .bind(track.spotify_popularity)
        .bind(track.in_library)
        .fetch_one(&self.pool)
        .await?)
    }
}
