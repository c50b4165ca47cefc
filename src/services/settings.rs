//! Typed key/value configuration with a hot in-memory cache.
//!
//! Backed by a single `settings` table keyed by string. The full table is
//! loaded into a process-local map at startup (seeding defaults for any
//! key a fresh install doesn't have yet); reads are served from the map and
//! writes go through a synchronous update that hits storage first, then the
//! map. Invalidation is explicit: after a bulk write a message is published
//! on the `settings:invalidate` Redis channel so other processes reading
//! through the same client reload their caches.

use deadpool_redis::Pool as RedisPool;
use redis::AsyncCommands;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::setting::SettingEntry;

pub const INVALIDATE_CHANNEL: &str = "settings:invalidate";

/// `(key, value, category)` defaults seeded on first run. Values are stored
/// as opaque strings and typed only at read time.
const DEFAULTS: &[(&str, &str, &str)] = &[
    ("spotify.client_id", "", "integrations"),
    ("spotify.client_secret", "", "integrations"),
    ("lastfm.api_key", "", "integrations"),
    ("lastfm.shared_secret", "", "integrations"),
    ("youtube_music.api_key", "", "integrations"),
    ("audiodb.api_key", "", "integrations"),
    ("prowlarr.url", "", "integrations"),
    ("prowlarr.api_key", "", "integrations"),
    ("prowlarr.min_title_match_score", "0.6", "integrations"),
    ("qbittorrent.url", "http://localhost:8080", "integrations"),
    ("qbittorrent.username", "", "integrations"),
    ("qbittorrent.password", "", "integrations"),
    ("qbittorrent.category", "vibarr", "integrations"),
    ("qbittorrent.incomplete_path", "/downloads/incomplete", "integrations"),
    ("qbittorrent.completed_path", "/downloads/complete", "integrations"),
    ("qbittorrent.remove_completed", "false", "integrations"),
    ("sabnzbd.enabled", "false", "integrations"),
    ("sabnzbd.url", "", "integrations"),
    ("sabnzbd.api_key", "", "integrations"),
    ("sabnzbd.category", "vibarr", "integrations"),
    ("sabnzbd.remove_completed", "false", "integrations"),
    ("plex.url", "", "integrations"),
    ("plex.token", "", "integrations"),
    ("plex.music_section", "Music", "integrations"),
    ("plex.section_key", "1", "integrations"),
    ("beets.enabled", "false", "integrations"),
    ("beets.config_path", "", "integrations"),
    ("beets.library_path", "/music/library", "integrations"),
    ("beets.auto_import", "true", "integrations"),
    ("beets.move_files", "true", "integrations"),
    ("automation.auto_download_enabled", "false", "automation"),
    ("automation.auto_download_confidence_threshold", "0.8", "automation"),
    ("automation.preferred_quality", "flac", "automation"),
    ("automation.max_concurrent_downloads", "3", "automation"),
    ("automation.download_path", "/downloads/incomplete", "automation"),
    ("automation.completed_download_path", "/downloads/complete", "automation"),
    ("recommendations.discover_weekly_size", "30", "recommendations"),
    ("recommendations.release_radar_window_days", "30", "recommendations"),
    ("recommendations.ml_profiling_enabled", "true", "recommendations"),
    ("recommendations.taste_embedding_half_life_days", "21", "recommendations"),
    ("recommendations.artist_affinity_half_life_days", "14", "recommendations"),
    ("recommendations.genre_affinity_half_life_days", "21", "recommendations"),
    ("recommendations.affinity_window_days", "180", "recommendations"),
    ("recommendations.max_per_artist", "3", "recommendations"),
    ("recommendations.max_per_category", "15", "recommendations"),
    ("library.import_path", "/music/library", "library"),
    ("auth.registration_enabled", "true", "auth"),
    ("auth.max_users", "0", "auth"),
];

#[derive(Clone)]
pub struct SettingsStore {
    pool: PgPool,
    redis: RedisPool,
    cache: Arc<RwLock<HashMap<String, SettingEntry>>>,
}

impl SettingsStore {
    /// Loads the full settings table into the in-memory cache, seeding any
    /// default key that storage doesn't have yet. Fails only if storage is
    /// unreachable; never surfaces per-key lookup errors afterwards.
    pub async fn load(pool: PgPool, redis: RedisPool) -> Result<Self> {
        let rows: Vec<SettingEntry> = sqlx::query_as::<_, SettingEntry>(
            "SELECT key, value, category, updated_at FROM settings",
        )
        .fetch_all(&pool)
        .await
        .map_err(|e| AppError::config_missing(format!("settings table unreachable: {e}")))?;

        let mut cache: HashMap<String, SettingEntry> =
            rows.into_iter().map(|row| (row.key.clone(), row)).collect();

        for (key, value, category) in DEFAULTS {
            if !cache.contains_key(*key) {
                let entry = insert_default(&pool, key, value, category).await?;
                cache.insert(entry.key.clone(), entry);
            }
        }

        info!(loaded = cache.len(), "settings cache warmed");

        Ok(Self {
            pool,
            redis,
            cache: Arc::new(RwLock::new(cache)),
        })
    }

    pub async fn string(&self, key: &str, default: &str) -> String {
        self.cache
            .read()
            .await
            .get(key)
            .map(|e| e.value.clone())
            .unwrap_or_else(|| default.to_string())
    }

    pub async fn optional(&self, key: &str) -> Option<String> {
        self.cache.read().await.get(key).and_then(|e| {
            if e.value.is_empty() {
                None
            } else {
                Some(e.value.clone())
            }
        })
    }

    pub async fn bool(&self, key: &str, default: bool) -> bool {
        match self.optional(key).await {
            Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            None => default,
        }
    }

    pub async fn int(&self, key: &str, default: i64) -> i64 {
        self.optional(key)
            .await
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub async fn float(&self, key: &str, default: f64) -> f64 {
        self.optional(key)
            .await
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Writes `key` to storage, then the in-memory cache; the cache never
    /// observes a write that storage rejected.
    pub async fn set(&self, key: &str, value: &str, category: &str) -> Result<()> {
        let entry = upsert_setting(&self.pool, key, value, category).await?;
        self.cache.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }

    /// Writes several settings under one invalidation broadcast, for callers
    /// changing a whole integration's config at once.
    pub async fn set_many(&self, entries: &[(&str, &str, &str)]) -> Result<()> {
        for (key, value, category) in entries {
            self.set(key, value, category).await?;
        }
        self.publish_invalidation().await;
        Ok(())
    }

    /// Signals long-running clients (integration clients caching credentials
    /// derived from settings) to re-read after a bulk write.
    pub async fn publish_invalidation(&self) {
        let mut conn = match self.redis.get().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "could not publish settings invalidation");
                return;
            }
        };
        if let Err(e) = conn
            .publish::<_, _, ()>(INVALIDATE_CHANNEL, "invalidate")
            .await
        {
            warn!(error = %e, "settings invalidation publish failed");
        }
    }

    pub async fn all_in_category(&self, category: &str) -> Vec<SettingEntry> {
        self.cache
            .read()
            .await
            .values()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }
}

async fn insert_default(
    pool: &PgPool,
    key: &str,
    value: &str,
    category: &str,
) -> Result<SettingEntry> {
    sqlx::query_as::<_, SettingEntry>(
        r#"
        INSERT INTO settings (key, value, category, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (key) DO NOTHING
        RETURNING key, value, category, updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(category)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?
    .map(Ok)
    .unwrap_or_else(|| {
        Ok(SettingEntry {
            key: key.to_string(),
            value: value.to_string(),
            category: category.to_string(),
            updated_at: chrono::Utc::now(),
        })
    })
}

async fn upsert_setting(
    pool: &PgPool,
    key: &str,
    value: &str,
    category: &str,
) -> Result<SettingEntry> {
    sqlx::query_as::<_, SettingEntry>(
        r#"
        INSERT INTO settings (key, value, category, updated_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (key) DO UPDATE SET
            value = EXCLUDED.value,
            category = EXCLUDED.category,
            updated_at = EXCLUDED.updated_at
        RETURNING key, value, category, updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(category)
    .fetch_one(pool)
    .await
    .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str) -> SettingEntry {
        SettingEntry {
            key: key.to_string(),
            value: value.to_string(),
            category: "test".to_string(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn bool_accessor_recognizes_truthy_strings() {
        let cache = Arc::new(RwLock::new(HashMap::from([(
            "flag".to_string(),
            entry("flag", "yes"),
        )])));
        let store_cache = cache.clone();
        let read = store_cache.read().await;
        let value = read.get("flag").unwrap().value.clone();
        assert!(matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"));
    }
}
