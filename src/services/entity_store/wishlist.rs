//! Persistence for wishlist items.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::wishlist::{CreateWishlistItemRequest, WishlistItem, WishlistStatus};

#[derive(Clone)]
pub struct WishlistRepository {
    pool: PgPool,
}

impl WishlistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<WishlistItem> {
        sqlx::query_as::<_, WishlistItem>("SELECT * FROM wishlist_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("wishlist item {id}")))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<WishlistItem>> {
        Ok(sqlx::query_as::<_, WishlistItem>(
            "SELECT * FROM wishlist_items WHERE user_id = $1 ORDER BY priority DESC, created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Items eligible for the `process-wishlist` job: `wanted` or a
    /// previously `failed` item past its retry cooldown.
    pub async fn due_for_search(&self, limit: i64) -> Result<Vec<WishlistItem>> {
        Ok(sqlx::query_as::<_, WishlistItem>(
            r#"
            SELECT * FROM wishlist_items
            WHERE status = 'wanted' OR (status = 'failed' AND auto_download = true)
            ORDER BY priority DESC, created_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        request: CreateWishlistItemRequest,
    ) -> Result<WishlistItem> {
        Ok(sqlx::query_as::<_, WishlistItem>(
            r#"
            INSERT INTO wishlist_items (
                id, user_id, item_type, status, priority, source, artist_id, album_id,
                artist_name, album_title, musicbrainz_id, spotify_id, preferred_format,
                auto_download, search_count, created_at, updated_at
            ) VALUES (
                $1, $2, $3, 'wanted', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 0, now(), now()
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.item_type)
        .bind(request.priority.unwrap_or(crate::models::wishlist::WishlistPriority::Normal))
        .bind(request.source)
        .bind(request.artist_id)
        .bind(request.album_id)
        .bind(&request.artist_name)
        .bind(&request.album_title)
        .bind(&request.musicbrainz_id)
        .bind(&request.spotify_id)
        .bind(&request.preferred_format)
        .bind(request.auto_download.unwrap_or(false))
        .fetch_one(&self.pool)
        .await?)
    }

    /// Step 1 of Search: mark `searching`, stamp `last_searched_at`,
    /// increment `search_count`.
    pub async fn mark_searching(&self, id: Uuid) -> Result<WishlistItem> {
        Ok(sqlx::query_as::<_, WishlistItem>(
            r#"
            UPDATE wishlist_items SET
                status = 'searching', last_searched_at = $2, search_count = search_count + 1,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?)
    }

    /// No results: revert to `wanted`.
    pub async fn revert_to_wanted(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE wishlist_items SET status = 'wanted', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_status(&self, id: Uuid, status: WishlistStatus) -> Result<()> {
        sqlx::query("UPDATE wishlist_items SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Used by the `set_quality_profile` rule action; there's no per-item
    /// quality-profile column, so the profile's tier is projected onto the
    /// existing `preferred_format` field.
    pub async fn set_preferred_format(&self, id: Uuid, format: &str) -> Result<()> {
        sqlx::query("UPDATE wishlist_items SET preferred_format = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(format)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Used by the `start_download` rule action to force a non-terminal item
    /// back to the front of the `process-wishlist` queue.
    pub async fn set_auto_download(&self, id: Uuid, auto_download: bool) -> Result<()> {
        sqlx::query("UPDATE wishlist_items SET auto_download = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(auto_download)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM wishlist_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
