//! Persistence for artists.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::artist::Artist;

#[derive(Clone)]
pub struct ArtistRepository {
    pool: PgPool,
}

impl ArtistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Artist> {
        sqlx::query_as::<_, Artist>("SELECT * FROM artists WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("artist {id}")))
    }

    pub async fn find_by_musicbrainz_id(&self, mbid: &str) -> Result<Option<Artist>> {
        Ok(
            sqlx::query_as::<_, Artist>("SELECT * FROM artists WHERE musicbrainz_id = $1")
                .bind(mbid)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Artist>> {
        Ok(sqlx::query_as::<_, Artist>(
            "SELECT * FROM artists WHERE LOWER(name) = LOWER($1) LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_in_library(&self, limit: i64, offset: i64) -> Result<Vec<Artist>> {
        Ok(sqlx::query_as::<_, Artist>(
            "SELECT * FROM artists WHERE in_library = true ORDER BY name LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<Artist>> {
        let pattern = format!("%{query}%");
        Ok(sqlx::query_as::<_, Artist>(
            "SELECT * FROM artists WHERE name ILIKE $1 ORDER BY name LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Upsert keyed on MusicBrainz id when present, otherwise on exact name.
    pub async fn upsert(&self, artist: &Artist) -> Result<Artist> {
        let existing = match &artist.musicbrainz_id {
            Some(mbid) => self.find_by_musicbrainz_id(mbid).await?,
            None => self.find_by_name(&artist.name).await?,
        };

        if let Some(existing) = existing {
            self.update_enrichment(existing.id, artist).await
        } else {
            self.insert(artist).await
        }
    }

    async fn insert(&self, artist: &Artist) -> Result<Artist> {
        Ok(sqlx::query_as::<_, Artist>(
            r#"
            INSERT INTO artists (
                id, name, sort_name, disambiguation, musicbrainz_id, spotify_id,
                discogs_id, lastfm_url, biography, country, formed_year, disbanded_year,
                genres, tags, mean_danceability, mean_energy, mean_valence, mean_tempo,
                spotify_popularity, lastfm_listeners, lastfm_playcount, in_library,
                media_server_key, image_urls, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, now(), now()
            )
            RETURNING *
            "#,
        )
        .bind(artist.id)
        .bind(&artist.name)
        .bind(&artist.sort_name)
        .bind(&artist.disambiguation)
        .bind(&artist.musicbrainz_id)
        .bind(&artist.spotify_id)
        .bind(&artist.discogs_id)
        .bind(&artist.lastfm_url)
        .bind(&artist.biography)
        .bind(&artist.country)
        .bind(artist.formed_year)
        .bind(artist.disbanded_year)
        .bind(&artist.genres)
        .bind(&artist.tags)
        .bind(artist.mean_danceability)
        .bind(artist.mean_energy)
        .bind(artist.mean_valence)
        .bind(artist.mean_tempo)
        .bind(artist.spotify_popularity)
        .bind(artist.lastfm_listeners)
        .bind(artist.lastfm_playcount)
        .bind(artist.in_library)
        .bind(&artist.media_server_key)
        .bind(&artist.image_urls)
        .fetch_one(&self.pool)
        .await?)
    }

    /// Merges externally-sourced fields into an existing row without
    /// clobbering the library flag or media-server key a sync already set.
    async fn update_enrichment(&self, id: Uuid, artist: &Artist) -> Result<Artist> {
        Ok(sqlx::query_as::<_, Artist>(
            r#"
            UPDATE artists SET
                biography = COALESCE($2, biography),
                country = COALESCE($3, country),
                genres = CASE WHEN array_length($4::text[], 1) > 0 THEN $4 ELSE genres END,
                mean_danceability = COALESCE($5, mean_danceability),
                mean_energy = COALESCE($6, mean_energy),
                mean_valence = COALESCE($7, mean_valence),
                mean_tempo = COALESCE($8, mean_tempo),
                spotify_popularity = COALESCE($9, spotify_popularity),
                lastfm_listeners = COALESCE($10, lastfm_listeners),
                lastfm_playcount = COALESCE($11, lastfm_playcount),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&artist.biography)
        .bind(&artist.country)
        .bind(&artist.genres)
        .bind(artist.mean_danceability)
        .bind(artist.mean_energy)
        .bind(artist.mean_valence)
        .bind(artist.mean_tempo)
        .bind(artist.spotify_popularity)
        .bind(artist.lastfm_listeners)
        .bind(artist.lastfm_playcount)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn mark_in_library(&self, id: Uuid, media_server_key: &str) -> Result<()> {
        sqlx::query("UPDATE artists SET in_library = true, media_server_key = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(media_server_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Used by the `tag_item` rule action; `update_enrichment` deliberately
    /// leaves tags alone, so this goes direct.
    pub async fn set_tags(&self, id: Uuid, tags: &[String]) -> Result<()> {
        sqlx::query("UPDATE artists SET tags = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(tags)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
