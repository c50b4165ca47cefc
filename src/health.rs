//! Health, readiness and liveness checks.
//!
//! `/health/ready.checks` has exactly the keys `{database, redis}`; `status`
//! is `"ready"` iff both are true, otherwise `"degraded"` with HTTP 200 — a client
//! may still treat the API as usable when `database=true` even if degraded.

use crate::database::{health_check as db_health_check, redis_health_check};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub correlation_id: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub services: HashMap<String, ServiceHealthInfo>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceHealthInfo {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(5) }
    }
}

pub struct HealthChecker {
    #[allow(dead_code)]
    config: HealthCheckConfig,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self { config, start_time: Instant::now() }
    }

    pub async fn check_health(
        &self,
        db_pool: &sqlx::PgPool,
        redis_pool: &deadpool_redis::Pool,
    ) -> HealthCheckResponse {
        let correlation_id = Uuid::new_v4().to_string();
        let mut services = HashMap::new();

        services.insert("database".to_string(), self.check_database(db_pool).await);
        services.insert("redis".to_string(), self.check_redis(redis_pool).await);

        let status = if services.values().all(|s| s.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else if services.values().any(|s| s.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };

        HealthCheckResponse {
            status,
            timestamp: chrono::Utc::now(),
            correlation_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            services,
        }
    }

    async fn check_database(&self, pool: &sqlx::PgPool) -> ServiceHealthInfo {
        let start = Instant::now();
        match db_health_check(pool).await {
            Ok(()) => ServiceHealthInfo {
                status: HealthStatus::Healthy,
                response_time_ms: start.elapsed().as_millis() as u64,
                error_message: None,
            },
            Err(err) => ServiceHealthInfo {
                status: HealthStatus::Unhealthy,
                response_time_ms: start.elapsed().as_millis() as u64,
                error_message: Some(err.to_string()),
            },
        }
    }

    async fn check_redis(&self, pool: &deadpool_redis::Pool) -> ServiceHealthInfo {
        let start = Instant::now();
        match redis_health_check(pool).await {
            Ok(()) => ServiceHealthInfo {
                status: HealthStatus::Healthy,
                response_time_ms: start.elapsed().as_millis() as u64,
                error_message: None,
            },
            Err(err) => ServiceHealthInfo {
                status: HealthStatus::Unhealthy,
                response_time_ms: start.elapsed().as_millis() as u64,
                error_message: Some(err.to_string()),
            },
        }
    }
}

/// Readiness response: `checks` has only `database` and `redis`, `status` is
/// `"ready"` iff both are true.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
    pub redis: bool,
}

pub async fn readiness_check(
    db_pool: &sqlx::PgPool,
    redis_pool: &deadpool_redis::Pool,
) -> ReadinessResponse {
    let database = db_health_check(db_pool).await.is_ok();
    let redis = redis_health_check(redis_pool).await.is_ok();
    let status = if database && redis { "ready" } else { "degraded" };
    ReadinessResponse { status, checks: ReadinessChecks { database, redis } }
}

pub async fn liveness_check() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_status_is_unhealthy_if_any_service_unhealthy() {
        let mut services = HashMap::new();
        services.insert(
            "database".to_string(),
            ServiceHealthInfo { status: HealthStatus::Unhealthy, response_time_ms: 5, error_message: None },
        );
        services.insert(
            "redis".to_string(),
            ServiceHealthInfo { status: HealthStatus::Healthy, response_time_ms: 5, error_message: None },
        );
        let unhealthy = services.values().any(|s| s.status == HealthStatus::Unhealthy);
        assert!(unhealthy);
    }
}
