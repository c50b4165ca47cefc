//! Persistence for users.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::user::User;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {id}")))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Used by per-user scheduler jobs (listening-history sync, recommendation
    /// rebuilds, taste-profile recompute) to iterate every active account.
    pub async fn list_active(&self) -> Result<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE is_active = true ORDER BY username")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn create(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, is_admin, is_active,
                cached_tags, share_listening_activity, share_taste_profile,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, false, true, '{}', false, false, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn record_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Used once, by setup, to promote the first account created on a fresh
    /// install to admin.
    pub async fn set_admin(&self, id: Uuid, is_admin: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_admin = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(is_admin)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn link_media_server(&self, id: Uuid, username: &str, token: &str) -> Result<()> {
        sqlx::query(
            "UPDATE users SET media_server_username = $2, media_server_token = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(username)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_privacy(&self, id: Uuid, share_listening_activity: bool, share_taste_profile: bool) -> Result<()> {
        sqlx::query(
            "UPDATE users SET share_listening_activity = $2, share_taste_profile = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(share_listening_activity)
        .bind(share_taste_profile)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Caches the nearest taste cluster on the user row so reads (e.g.
    /// `social::shared_profiles_handler`) don't need to touch `taste_profiles`
    /// on every request. Called after each taste-profile recompute.
    pub async fn set_cached_taste_cluster(&self, id: Uuid, cluster: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET cached_taste_cluster = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(cluster)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
