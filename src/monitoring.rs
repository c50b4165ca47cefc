//! Comprehensive monitoring and observability system
//!
//! Combines health checks, metrics collection, and performance monitoring into a
//! single background task and a single `/health/monitoring`-style response.

use crate::error::{AppError, Result};
use crate::health::{HealthCheckConfig, HealthCheckResponse, HealthChecker};
use crate::metrics::{DatabaseMetrics, MetricsCollector, RedisMetrics};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sysinfo::System;
use tokio::time::interval;
use tracing::{error, info, warn};

/// Comprehensive monitoring system
#[derive(Clone)]
pub struct MonitoringSystem {
    metrics: Arc<MetricsCollector>,
    health_checker: Arc<HealthChecker>,
    db_metrics: Arc<DatabaseMetrics>,
    redis_metrics: Arc<RedisMetrics>,
    start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub health_check_interval: Duration,
    pub metrics_update_interval: Duration,
    pub system_metrics_enabled: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(30),
            metrics_update_interval: Duration::from_secs(10),
            system_metrics_enabled: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub memory_usage_bytes: u64,
    pub memory_usage_percent: f32,
    pub cpu_usage_percent: f32,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub database: DatabaseServiceMetrics,
    pub redis: RedisServiceMetrics,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseServiceMetrics {
    pub active_connections: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RedisServiceMetrics {
    pub active_connections: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitoringResponse {
    pub health: HealthCheckResponse,
    pub system_metrics: SystemMetrics,
    pub service_metrics: ServiceMetrics,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl MonitoringSystem {
    pub fn new(config: MonitoringConfig) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new().map_err(|e| AppError::Internal {
            message: Some(format!("Failed to create metrics collector: {}", e)),
        })?);

        let health_checker = Arc::new(HealthChecker::new(HealthCheckConfig::default()));
        let db_metrics = Arc::new(DatabaseMetrics::new(metrics.clone()));
        let redis_metrics = Arc::new(RedisMetrics::new(metrics.clone()));

        let _ = config.system_metrics_enabled;
        Ok(Self {
            metrics,
            health_checker,
            db_metrics,
            redis_metrics,
            start_time: Instant::now(),
        })
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn db_metrics(&self) -> Arc<DatabaseMetrics> {
        self.db_metrics.clone()
    }

    pub fn redis_metrics(&self) -> Arc<RedisMetrics> {
        self.redis_metrics.clone()
    }

    pub async fn comprehensive_check(
        &self,
        db_pool: &sqlx::PgPool,
        redis_pool: &deadpool_redis::Pool,
    ) -> MonitoringResponse {
        let health = self.health_checker.check_health(db_pool, redis_pool).await;
        let system_metrics = self.get_system_metrics().await;
        let service_metrics = self.get_service_metrics(db_pool, redis_pool);

        MonitoringResponse {
            health,
            system_metrics,
            service_metrics,
            timestamp: chrono::Utc::now(),
        }
    }

    async fn get_system_metrics(&self) -> SystemMetrics {
        let mut sys = System::new_all();
        sys.refresh_all();

        let memory_usage_bytes = sys.used_memory();
        let total_memory = sys.total_memory();
        let memory_usage_percent = if total_memory > 0 {
            (memory_usage_bytes as f32 / total_memory as f32) * 100.0
        } else {
            0.0
        };

        let cpu_usage_percent = if sys.cpus().is_empty() {
            0.0
        } else {
            sys.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / sys.cpus().len() as f32
        };
        let uptime_seconds = self.start_time.elapsed().as_secs();

        self.metrics
            .collect_real_system_metrics(std::path::Path::new("."), uptime_seconds);

        SystemMetrics {
            memory_usage_bytes,
            memory_usage_percent,
            cpu_usage_percent,
            uptime_seconds,
        }
    }

    fn get_service_metrics(
        &self,
        db_pool: &sqlx::PgPool,
        redis_pool: &deadpool_redis::Pool,
    ) -> ServiceMetrics {
        self.db_metrics.update_pool_metrics(db_pool);
        self.redis_metrics.update_pool_metrics(redis_pool);

        let db_active = (db_pool.size() as usize).saturating_sub(db_pool.num_idle()) as u32;
        let db_idle = db_pool.num_idle() as u32;

        let redis_status = redis_pool.status();
        let redis_active = (redis_status.size.saturating_sub(redis_status.available)) as u32;

        ServiceMetrics {
            database: DatabaseServiceMetrics {
                active_connections: db_active,
                idle_connections: db_idle,
            },
            redis: RedisServiceMetrics {
                active_connections: redis_active,
            },
        }
    }

    /// Periodically logs health status and refreshes pool/system gauges.
    pub async fn start_background_monitoring(
        &self,
        config: MonitoringConfig,
        db_pool: sqlx::PgPool,
        redis_pool: deadpool_redis::Pool,
    ) {
        let monitoring = self.clone();

        tokio::spawn(async move {
            let mut health_interval = interval(config.health_check_interval);
            let mut metrics_interval = interval(config.metrics_update_interval);

            loop {
                tokio::select! {
                    _ = health_interval.tick() => {
                        let health = monitoring.health_checker.check_health(&db_pool, &redis_pool).await;

                        match health.status {
                            crate::health::HealthStatus::Healthy => {
                                info!("health check passed: all services healthy");
                            }
                            crate::health::HealthStatus::Degraded => {
                                warn!("health check warning: some services degraded");
                            }
                            crate::health::HealthStatus::Unhealthy => {
                                error!("health check failed: services unhealthy");
                            }
                        }
                    }

                    _ = metrics_interval.tick() => {
                        if config.system_metrics_enabled {
                            let _ = monitoring.get_system_metrics().await;
                        }
                        monitoring.db_metrics.update_pool_metrics(&db_pool);
                        monitoring.redis_metrics.update_pool_metrics(&redis_pool);
                    }
                }
            }
        });
    }
}

/// Performance profiler for critical operations
pub struct PerformanceProfiler {
    metrics: Arc<MetricsCollector>,
}

impl PerformanceProfiler {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }

    pub async fn profile_db_operation<F, T, E>(
        &self,
        operation: &str,
        table: &str,
        future: F,
    ) -> std::result::Result<T, E>
    where
        F: std::future::Future<Output = std::result::Result<T, E>>,
    {
        let start = Instant::now();
        let result = future.await;
        let duration = start.elapsed();
        let success = result.is_ok();

        self.metrics
            .record_db_operation(operation, table, duration, success);

        if duration > Duration::from_millis(100) {
            warn!(
                operation = operation,
                table = table,
                duration_ms = duration.as_millis(),
                success = success,
                "slow database operation"
            );
        }

        result
    }

    pub async fn profile_redis_operation<F, T, E>(
        &self,
        operation: &str,
        future: F,
    ) -> std::result::Result<T, E>
    where
        F: std::future::Future<Output = std::result::Result<T, E>>,
    {
        let start = Instant::now();
        let result = future.await;
        let duration = start.elapsed();
        let success = result.is_ok();

        self.metrics
            .record_redis_operation(operation, duration, success);

        if duration > Duration::from_millis(50) {
            warn!(
                operation = operation,
                duration_ms = duration.as_millis(),
                success = success,
                "slow redis operation"
            );
        }

        result
    }
}

#[derive(Debug, Clone)]
pub struct AlertThresholds {
    pub max_memory_usage_percent: f32,
    pub max_cpu_usage_percent: f32,
    pub min_available_connections: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_memory_usage_percent: 80.0,
            max_cpu_usage_percent: 80.0,
            min_available_connections: 5,
        }
    }
}

pub struct AlertManager {
    thresholds: AlertThresholds,
}

impl AlertManager {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn check_alerts(&self, monitoring_response: &MonitoringResponse) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if monitoring_response.system_metrics.memory_usage_percent
            > self.thresholds.max_memory_usage_percent
        {
            alerts.push(Alert {
                severity: AlertSeverity::Warning,
                message: format!(
                    "high memory usage: {:.1}% (threshold: {:.1}%)",
                    monitoring_response.system_metrics.memory_usage_percent,
                    self.thresholds.max_memory_usage_percent
                ),
                metric: "memory_usage_percent".to_string(),
                value: monitoring_response.system_metrics.memory_usage_percent as f64,
                threshold: self.thresholds.max_memory_usage_percent as f64,
            });
        }

        if monitoring_response.system_metrics.cpu_usage_percent
            > self.thresholds.max_cpu_usage_percent
        {
            alerts.push(Alert {
                severity: AlertSeverity::Warning,
                message: format!(
                    "high CPU usage: {:.1}% (threshold: {:.1}%)",
                    monitoring_response.system_metrics.cpu_usage_percent,
                    self.thresholds.max_cpu_usage_percent
                ),
                metric: "cpu_usage_percent".to_string(),
                value: monitoring_response.system_metrics.cpu_usage_percent as f64,
                threshold: self.thresholds.max_cpu_usage_percent as f64,
            });
        }

        let db_available = monitoring_response
            .service_metrics
            .database
            .idle_connections;
        if db_available < self.thresholds.min_available_connections {
            alerts.push(Alert {
                severity: AlertSeverity::Critical,
                message: format!(
                    "low database connections available: {} (threshold: {})",
                    db_available, self.thresholds.min_available_connections
                ),
                metric: "db_available_connections".to_string(),
                value: db_available as f64,
                threshold: self.thresholds.min_available_connections as f64,
            });
        }

        alerts
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_monitoring_system_creation() {
        let config = MonitoringConfig::default();
        let monitoring = MonitoringSystem::new(config).expect("Failed to create monitoring system");

        let metrics_text = monitoring
            .metrics()
            .get_metrics()
            .expect("Failed to get metrics");
        assert!(!metrics_text.is_empty());
    }

    #[test]
    fn test_alert_manager() {
        let thresholds = AlertThresholds {
            max_memory_usage_percent: 80.0,
            max_cpu_usage_percent: 80.0,
            ..Default::default()
        };

        let alert_manager = AlertManager::new(thresholds);

        let monitoring_response = MonitoringResponse {
            health: HealthCheckResponse {
                status: crate::health::HealthStatus::Healthy,
                timestamp: chrono::Utc::now(),
                correlation_id: "test".to_string(),
                version: "test".to_string(),
                uptime_seconds: 100,
                services: std::collections::HashMap::new(),
            },
            system_metrics: SystemMetrics {
                memory_usage_bytes: 1_000_000_000,
                memory_usage_percent: 85.0,
                cpu_usage_percent: 50.0,
                uptime_seconds: 100,
            },
            service_metrics: ServiceMetrics {
                database: DatabaseServiceMetrics {
                    active_connections: 5,
                    idle_connections: 10,
                },
                redis: RedisServiceMetrics {
                    active_connections: 2,
                },
            },
            timestamp: chrono::Utc::now(),
        };

        let alerts = alert_manager.check_alerts(&monitoring_response);
        assert!(!alerts.is_empty());
        assert!(alerts.iter().any(|a| a.metric == "memory_usage_percent"));
    }
}
