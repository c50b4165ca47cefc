//! Entity store plumbing: pool creation, migrations, and the startup readiness
//! probe. The entity store itself (repositories, transactional state
//! transitions) lives in `services::entity_store`; this module owns only the
//! pool lifecycle the rest of the crate depends on.

use crate::config::{DatabaseSettings, RedisSettings};
use crate::error::{AppError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;

pub type DatabasePool = PgPool;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl From<&DatabaseSettings> for DatabaseConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            max_connections: settings.max_connections,
            connect_timeout: settings.connection_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfiguration {
    pub max_size: usize,
}

impl From<&RedisSettings> for RedisConfiguration {
    fn from(settings: &RedisSettings) -> Self {
        Self { max_size: settings.max_size }
    }
}

pub async fn create_pool(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.connection_timeout)
        .idle_timeout(settings.idle_timeout)
        .connect(&settings.url)
        .await?;
    Ok(pool)
}

pub async fn create_redis_pool(settings: &RedisSettings) -> anyhow::Result<deadpool_redis::Pool> {
    let cfg = deadpool_redis::Config::from_url(&settings.url);
    let pool = cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

pub async fn redis_health_check(pool: &deadpool_redis::Pool) -> Result<()> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| AppError::Redis(redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            e.to_string(),
        ))))?;
    redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
    Ok(())
}

/// Delay before the retry following a failed `attempt`: `1s, 2s, 4s, ...`
/// capped at 60s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let cap = Duration::from_secs(60);
    2_u32
        .checked_pow(attempt.saturating_sub(1))
        .map(|factor| Duration::from_secs(factor as u64))
        .unwrap_or(cap)
        .min(cap)
}

/// Blocks until the backing store answers `SELECT 1`, retrying with exponential
/// backoff: `1s, 2s, 4s, ... capped at 60s`, up to `max_attempts` (default 30).
/// The final attempt's failure is fatal and aborts startup.
pub async fn wait_for_database(pool: &PgPool, max_attempts: u32) -> Result<()> {
    for attempt in 1..=max_attempts {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => {
                if attempt > 1 {
                    tracing::info!(attempt, "database became ready");
                }
                return Ok(());
            }
            Err(err) if attempt < max_attempts => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "database not ready, retrying"
                );
                sleep(delay).await;
            }
            Err(err) => {
                tracing::error!(attempt, error = %err, "database never became ready");
                return Err(AppError::Fatal {
                    message: format!("database unreachable after {attempt} attempts: {err}"),
                });
            }
        }
    }
    unreachable!("loop always returns by the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_doubles_then_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn database_config_from_settings() {
        let settings = DatabaseSettings {
            url: "postgres://localhost/test".to_string(),
            max_connections: 5,
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
        };
        let config = DatabaseConfig::from(&settings);
        assert_eq!(config.max_connections, 5);
    }
}
