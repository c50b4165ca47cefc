//! Persistence for downloads, including the transactional state transition
//! shared by the search/grab/poll/import stages of the download pipeline.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::download::{Download, DownloadStatus};
use crate::models::wishlist::WishlistStatus;

#[derive(Clone)]
pub struct DownloadRepository {
    pool: PgPool,
}

impl DownloadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Download> {
        sqlx::query_as::<_, Download>("SELECT * FROM downloads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("download {id}")))
    }

    pub async fn list_active(&self) -> Result<Vec<Download>> {
        Ok(sqlx::query_as::<_, Download>(
            "SELECT * FROM downloads WHERE status IN ('downloading', 'queued') ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn count_active(&self) -> Result<i64> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM downloads WHERE status IN ('downloading', 'queued')",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    /// Invariant 1: `artist_name`/`album_title` are required at creation;
    /// `download_client` is only ever set by a later transition.
    pub async fn create(
        &self,
        wishlist_item_id: Option<Uuid>,
        artist_name: &str,
        album_title: &str,
        source: crate::models::download::DownloadSource,
    ) -> Result<Download> {
        Ok(sqlx::query_as::<_, Download>(
            r#"
            INSERT INTO downloads (
                id, wishlist_item_id, status, source, artist_name, album_title,
                beets_imported, created_at, updated_at
            ) VALUES ($1, $2, 'pending', $3, $4, $5, false, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(wishlist_item_id)
        .bind(source)
        .bind(artist_name)
        .bind(album_title)
        .fetch_one(&self.pool)
        .await?)
    }

    /// Advances a download to `status`, optionally updating the fields each
    /// pipeline stage is responsible for, and — in the same transaction —
    /// syncs the linked wishlist item's shadow status (invariant 2:
    /// download-side dominates). `failure_reason` is recorded on the
    /// download only; the wishlist item's own `failure_reason` mirrors it.
    #[allow(clippy::too_many_arguments)]
    pub async fn transition(
        &self,
        id: Uuid,
        status: DownloadStatus,
        download_client: Option<&str>,
        client_job_id: Option<&str>,
        search_score: Option<f64>,
        final_path: Option<&str>,
        failure_reason: Option<&str>,
    ) -> Result<Download> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let started_at = matches!(status, DownloadStatus::Downloading).then_some(now);
        let completed_at = matches!(
            status,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
        )
        .then_some(now);

        let download = sqlx::query_as::<_, Download>(
            r#"
            UPDATE downloads SET
                status = $2,
                download_client = COALESCE($3, download_client),
                client_job_id = COALESCE($4, client_job_id),
                search_score = COALESCE($5, search_score),
                final_path = COALESCE($6, final_path),
                failure_reason = $7,
                started_at = COALESCE(started_at, $8),
                completed_at = COALESCE($9, completed_at),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(download_client)
        .bind(client_job_id)
        .bind(search_score)
        .bind(final_path)
        .bind(failure_reason)
        .bind(started_at)
        .bind(completed_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(format!("download {id}")))?;

        if let Some(wishlist_item_id) = download.wishlist_item_id {
            let wishlist_status = shadow_wishlist_status(status);
            sqlx::query(
                "UPDATE wishlist_items SET status = $2, failure_reason = $3, updated_at = now() WHERE id = $1",
            )
            .bind(wishlist_item_id)
            .bind(wishlist_status)
            .bind(failure_reason)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(download)
    }

    /// Refreshes the progress fields the poll loop reads from the download
    /// client; unlike [`transition`] this never touches status or the linked
    /// wishlist item.
    pub async fn update_progress(
        &self,
        id: Uuid,
        progress_percent: Option<f64>,
        speed_bytes_per_sec: Option<i64>,
        eta_seconds: Option<i64>,
        content_path: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE downloads SET
                progress_percent = COALESCE($2, progress_percent),
                speed_bytes_per_sec = COALESCE($3, speed_bytes_per_sec),
                eta_seconds = COALESCE($4, eta_seconds),
                final_path = COALESCE($5, final_path),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(progress_percent)
        .bind(speed_bytes_per_sec)
        .bind(eta_seconds)
        .bind(content_path)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Invariant 2: the download's status shadows onto the linked wishlist item.
/// `cancelled` has no wishlist-side analogue, so it reverts to `wanted` —
/// the item is eligible for another search attempt.
pub fn shadow_wishlist_status(status: DownloadStatus) -> WishlistStatus {
    match status {
        DownloadStatus::Pending | DownloadStatus::Searching => WishlistStatus::Searching,
        DownloadStatus::Found => WishlistStatus::Found,
        DownloadStatus::Queued | DownloadStatus::Downloading => WishlistStatus::Downloading,
        DownloadStatus::Importing => WishlistStatus::Importing,
        DownloadStatus::Completed => WishlistStatus::Downloaded,
        DownloadStatus::Failed => WishlistStatus::Failed,
        DownloadStatus::Cancelled => WishlistStatus::Wanted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_shadows_to_downloaded() {
        assert_eq!(
            shadow_wishlist_status(DownloadStatus::Completed),
            WishlistStatus::Downloaded
        );
    }

    #[test]
    fn found_shadows_to_found() {
        assert_eq!(shadow_wishlist_status(DownloadStatus::Found), WishlistStatus::Found);
    }

    #[test]
    fn queued_and_downloading_both_shadow_to_downloading() {
        assert_eq!(
            shadow_wishlist_status(DownloadStatus::Queued),
            WishlistStatus::Downloading
        );
        assert_eq!(
            shadow_wishlist_status(DownloadStatus::Downloading),
            WishlistStatus::Downloading
        );
    }
}
