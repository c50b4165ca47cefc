//! Prometheus metrics collection.
//!
//! All gauges are populated from real state (pool sizes, queue depths, rate
//! limiter buckets), never placeholders.

use axum::{
    body::Body,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Disks, System};

/// Metrics collector with Prometheus integration
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    // HTTP metrics
    http_requests_total: CounterVec,
    http_request_duration: HistogramVec,
    http_requests_in_flight: Gauge,
    http_request_latency: HistogramVec,

    // Database metrics
    db_connections_active: Gauge,
    db_connections_idle: Gauge,
    db_query_duration: HistogramVec,
    db_operations_total: CounterVec,

    // Redis metrics
    redis_connections_active: Gauge,
    redis_operations_total: CounterVec,
    redis_operation_duration: HistogramVec,

    // Auth metrics
    user_registrations_total: Counter,
    user_logins_total: CounterVec,
    auth_failures_total: CounterVec,

    // System metrics
    memory_usage_bytes: Gauge,
    memory_rss_bytes: Gauge,
    cpu_usage_percent: Gauge,
    uptime_seconds: Gauge,

    // Disk metrics
    disk_usage_bytes: Gauge,
    disk_available_bytes: Gauge,
    disk_total_bytes: Gauge,

    // Automation metrics
    scheduler_job_queue_depth: GaugeVec,
    scheduler_jobs_total: CounterVec,
    wishlist_items_by_status: GaugeVec,
    active_downloads: Gauge,
    integration_rate_limit_tokens: GaugeVec,
    integration_circuit_state: GaugeVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with all metrics registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests")
                .namespace("vibarr")
                .subsystem("http"),
            &["method", "endpoint", "status_code"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .namespace("vibarr")
            .subsystem("http")
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "endpoint"],
        )?;

        let http_requests_in_flight = Gauge::new(
            "vibarr_http_requests_in_flight",
            "Number of HTTP requests currently being processed",
        )?;

        // Separate from http_request_duration: matched-route labels only, to
        // keep cardinality low enough for P50/P90/P99 dashboards.
        let http_request_latency = HistogramVec::new(
            HistogramOpts::new(
                "http_request_latency_seconds",
                "HTTP request latency in seconds for percentile calculations",
            )
            .namespace("vibarr")
            .subsystem("http")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
            &["method", "path", "status_code"],
        )?;

        let db_connections_active = Gauge::new(
            "vibarr_db_connections_active",
            "Number of active database connections",
        )?;

        let db_connections_idle = Gauge::new(
            "vibarr_db_connections_idle",
            "Number of idle database connections",
        )?;

        let db_query_duration = HistogramVec::new(
            HistogramOpts::new(
                "db_query_duration_seconds",
                "Database query duration in seconds",
            )
            .namespace("vibarr")
            .subsystem("db")
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["operation", "table"],
        )?;

        let db_operations_total = CounterVec::new(
            Opts::new("db_operations_total", "Total number of database operations")
                .namespace("vibarr")
                .subsystem("db"),
            &["operation", "table", "status"],
        )?;

        let redis_connections_active = Gauge::new(
            "vibarr_redis_connections_active",
            "Number of active Redis connections",
        )?;

        let redis_operations_total = CounterVec::new(
            Opts::new("redis_operations_total", "Total number of Redis operations")
                .namespace("vibarr")
                .subsystem("redis"),
            &["operation", "status"],
        )?;

        let redis_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "redis_operation_duration_seconds",
                "Redis operation duration in seconds",
            )
            .namespace("vibarr")
            .subsystem("redis")
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["operation"],
        )?;

        let user_registrations_total = Counter::new(
            "vibarr_user_registrations_total",
            "Total number of user registrations",
        )?;

        let user_logins_total = CounterVec::new(
            Opts::new("user_logins_total", "Total number of user login attempts")
                .namespace("vibarr")
                .subsystem("auth"),
            &["status", "method"],
        )?;

        let auth_failures_total = CounterVec::new(
            Opts::new(
                "auth_failures_total",
                "Total number of authentication failures",
            )
            .namespace("vibarr")
            .subsystem("auth"),
            &["reason"],
        )?;

        let memory_usage_bytes = Gauge::new(
            "vibarr_memory_usage_bytes",
            "Current total memory usage in bytes",
        )?;

        let memory_rss_bytes = Gauge::new(
            "vibarr_memory_rss_bytes",
            "Process resident set size (RSS) in bytes",
        )?;

        let cpu_usage_percent =
            Gauge::new("vibarr_cpu_usage_percent", "Current CPU usage percentage")?;

        let uptime_seconds = Gauge::new("vibarr_uptime_seconds", "Application uptime in seconds")?;

        let disk_usage_bytes = Gauge::new(
            "vibarr_disk_usage_bytes",
            "Disk space used by the library data directory in bytes",
        )?;

        let disk_available_bytes = Gauge::new(
            "vibarr_disk_available_bytes",
            "Available disk space for the library data directory in bytes",
        )?;

        let disk_total_bytes = Gauge::new(
            "vibarr_disk_total_bytes",
            "Total disk space for the library data directory in bytes",
        )?;

        let scheduler_job_queue_depth = GaugeVec::new(
            Opts::new(
                "vibarr_scheduler_job_queue_depth",
                "Number of pending scheduled jobs by job name",
            ),
            &["job_name"],
        )?;

        let scheduler_jobs_total = CounterVec::new(
            Opts::new(
                "vibarr_scheduler_jobs_total",
                "Total number of scheduled job runs by outcome",
            ),
            &["job_name", "outcome"],
        )?;

        let wishlist_items_by_status = GaugeVec::new(
            Opts::new(
                "vibarr_wishlist_items_by_status",
                "Wishlist items grouped by status",
            ),
            &["status"],
        )?;

        let active_downloads = Gauge::new(
            "vibarr_active_downloads",
            "Number of downloads currently in a non-terminal state",
        )?;

        let integration_rate_limit_tokens = GaugeVec::new(
            Opts::new(
                "vibarr_integration_rate_limit_tokens",
                "Rate limit tokens remaining per integration",
            ),
            &["integration"],
        )?;

        let integration_circuit_state = GaugeVec::new(
            Opts::new(
                "vibarr_integration_circuit_state",
                "Circuit breaker state per integration (0=closed, 1=half-open, 2=open)",
            ),
            &["integration"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_latency.clone()))?;
        registry.register(Box::new(db_connections_active.clone()))?;
        registry.register(Box::new(db_connections_idle.clone()))?;
        registry.register(Box::new(db_query_duration.clone()))?;
        registry.register(Box::new(db_operations_total.clone()))?;
        registry.register(Box::new(redis_connections_active.clone()))?;
        registry.register(Box::new(redis_operations_total.clone()))?;
        registry.register(Box::new(redis_operation_duration.clone()))?;
        registry.register(Box::new(user_registrations_total.clone()))?;
        registry.register(Box::new(user_logins_total.clone()))?;
        registry.register(Box::new(auth_failures_total.clone()))?;
        registry.register(Box::new(memory_usage_bytes.clone()))?;
        registry.register(Box::new(memory_rss_bytes.clone()))?;
        registry.register(Box::new(cpu_usage_percent.clone()))?;
        registry.register(Box::new(uptime_seconds.clone()))?;
        registry.register(Box::new(disk_usage_bytes.clone()))?;
        registry.register(Box::new(disk_available_bytes.clone()))?;
        registry.register(Box::new(disk_total_bytes.clone()))?;
        registry.register(Box::new(scheduler_job_queue_depth.clone()))?;
        registry.register(Box::new(scheduler_jobs_total.clone()))?;
        registry.register(Box::new(wishlist_items_by_status.clone()))?;
        registry.register(Box::new(active_downloads.clone()))?;
        registry.register(Box::new(integration_rate_limit_tokens.clone()))?;
        registry.register(Box::new(integration_circuit_state.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            http_requests_in_flight,
            http_request_latency,
            db_connections_active,
            db_connections_idle,
            db_query_duration,
            db_operations_total,
            redis_connections_active,
            redis_operations_total,
            redis_operation_duration,
            user_registrations_total,
            user_logins_total,
            auth_failures_total,
            memory_usage_bytes,
            memory_rss_bytes,
            cpu_usage_percent,
            uptime_seconds,
            disk_usage_bytes,
            disk_available_bytes,
            disk_total_bytes,
            scheduler_job_queue_depth,
            scheduler_jobs_total,
            wishlist_items_by_status,
            active_downloads,
            integration_rate_limit_tokens,
            integration_circuit_state,
        })
    }

    pub fn record_http_request(
        &self,
        method: &Method,
        endpoint: &str,
        status_code: StatusCode,
        duration: std::time::Duration,
    ) {
        let status_str = status_code.as_u16().to_string();

        self.http_requests_total
            .with_label_values(&[method.as_str(), endpoint, &status_str])
            .inc();

        self.http_request_duration
            .with_label_values(&[method.as_str(), endpoint])
            .observe(duration.as_secs_f64());
    }

    /// Record request latency for P50/P90/P99 calculations.
    pub fn record_request_latency(
        &self,
        method: &str,
        path: &str,
        status_code: u16,
        duration: std::time::Duration,
    ) {
        self.http_request_latency
            .with_label_values(&[method, path, &status_code.to_string()])
            .observe(duration.as_secs_f64());
    }

    pub fn increment_in_flight_requests(&self) {
        self.http_requests_in_flight.inc();
    }

    pub fn decrement_in_flight_requests(&self) {
        self.http_requests_in_flight.dec();
    }

    pub fn update_db_connections(&self, active: u32, idle: u32) {
        self.db_connections_active.set(active as f64);
        self.db_connections_idle.set(idle as f64);
    }

    pub fn record_db_operation(
        &self,
        operation: &str,
        table: &str,
        duration: std::time::Duration,
        success: bool,
    ) {
        let status = if success { "success" } else { "error" };

        self.db_operations_total
            .with_label_values(&[operation, table, status])
            .inc();

        self.db_query_duration
            .with_label_values(&[operation, table])
            .observe(duration.as_secs_f64());
    }

    pub fn update_redis_connections(&self, active: u32) {
        self.redis_connections_active.set(active as f64);
    }

    pub fn record_redis_operation(
        &self,
        operation: &str,
        duration: std::time::Duration,
        success: bool,
    ) {
        let status = if success { "success" } else { "error" };

        self.redis_operations_total
            .with_label_values(&[operation, status])
            .inc();

        self.redis_operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    pub fn record_user_registration(&self) {
        self.user_registrations_total.inc();
    }

    pub fn record_user_login(&self, success: bool, method: &str) {
        let status = if success { "success" } else { "failure" };
        self.user_logins_total
            .with_label_values(&[status, method])
            .inc();
    }

    pub fn record_auth_failure(&self, reason: &str) {
        self.auth_failures_total.with_label_values(&[reason]).inc();
    }

    /// Collect real system metrics using sysinfo: CPU, memory, disk, uptime.
    pub fn collect_real_system_metrics(&self, data_dir: &Path, uptime_secs: u64) {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let cpu_percent = if sys.cpus().is_empty() {
            0.0
        } else {
            sys.cpus().iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / sys.cpus().len() as f32
        };
        self.cpu_usage_percent.set(cpu_percent as f64);

        let total_memory_used = sys.used_memory();
        self.memory_usage_bytes.set(total_memory_used as f64);

        if let Ok(pid) = sysinfo::get_current_pid() {
            sys.refresh_process(pid);
            if let Some(process) = sys.process(pid) {
                self.memory_rss_bytes.set(process.memory() as f64);
            }
        }

        self.uptime_seconds.set(uptime_secs as f64);
        self.collect_disk_metrics(data_dir);
    }

    fn collect_disk_metrics(&self, data_dir: &Path) {
        let disks = Disks::new_with_refreshed_list();

        let abs_path = if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(data_dir))
                .unwrap_or_else(|_| data_dir.to_path_buf())
        };

        let mut best_match: Option<&sysinfo::Disk> = None;
        let mut best_match_len = 0;

        for disk in disks.list() {
            let mount_point = disk.mount_point();
            if abs_path.starts_with(mount_point) {
                let mount_len = mount_point.as_os_str().len();
                if mount_len > best_match_len {
                    best_match = Some(disk);
                    best_match_len = mount_len;
                }
            }
        }

        if let Some(disk) = best_match {
            let total = disk.total_space();
            let available = disk.available_space();
            let used = total.saturating_sub(available);

            self.disk_total_bytes.set(total as f64);
            self.disk_available_bytes.set(available as f64);
            self.disk_usage_bytes.set(used as f64);
        } else {
            self.disk_total_bytes.set(0.0);
            self.disk_available_bytes.set(0.0);
            self.disk_usage_bytes.set(0.0);
        }
    }

    /// Set the pending-job depth for one scheduled job.
    pub fn set_job_queue_depth(&self, job_name: &str, depth: u64) {
        self.scheduler_job_queue_depth
            .with_label_values(&[job_name])
            .set(depth as f64);
    }

    pub fn record_job_outcome(&self, job_name: &str, outcome: &str) {
        self.scheduler_jobs_total
            .with_label_values(&[job_name, outcome])
            .inc();
    }

    /// Set the wishlist item count for one status. Called after each status-changing
    /// write so the gauge always reflects the entity store, never a cached count.
    pub fn set_wishlist_count(&self, status: &str, count: u64) {
        self.wishlist_items_by_status
            .with_label_values(&[status])
            .set(count as f64);
    }

    pub fn set_active_downloads(&self, count: u64) {
        self.active_downloads.set(count as f64);
    }

    pub fn set_rate_limit_tokens(&self, integration: &str, tokens_remaining: f64) {
        self.integration_rate_limit_tokens
            .with_label_values(&[integration])
            .set(tokens_remaining);
    }

    /// 0 = closed, 1 = half-open, 2 = open.
    pub fn set_circuit_state(&self, integration: &str, state: u8) {
        self.integration_circuit_state
            .with_label_values(&[integration])
            .set(state as f64);
    }

    pub fn get_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }
}

/// HTTP request timer for measuring request duration
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<MetricsCollector>,
    method: Method,
    endpoint: String,
}

impl RequestTimer {
    pub fn new(metrics: Arc<MetricsCollector>, method: Method, endpoint: String) -> Self {
        metrics.increment_in_flight_requests();
        Self {
            start: Instant::now(),
            metrics,
            method,
            endpoint,
        }
    }

    pub fn finish(self, status_code: StatusCode) {
        let duration = self.start.elapsed();
        self.metrics.decrement_in_flight_requests();
        self.metrics
            .record_http_request(&self.method, &self.endpoint, status_code, duration);
    }
}

pub async fn metrics_handler(State(metrics): State<Arc<MetricsCollector>>) -> impl IntoResponse {
    match metrics.get_metrics() {
        Ok(metrics_text) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
            .body(Body::from(metrics_text))
            .unwrap(),
        Err(err) => {
            tracing::error!("Failed to generate metrics: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "error": "Failed to generate metrics",
                        "details": err.to_string()
                    })
                    .to_string(),
                ))
                .unwrap()
        }
    }
}

/// Performance monitoring for database operations
pub struct DatabaseMetrics {
    metrics: Arc<MetricsCollector>,
}

impl DatabaseMetrics {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }

    pub async fn time_operation<F, T, E>(
        &self,
        operation: &str,
        table: &str,
        future: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = future.await;
        let duration = start.elapsed();
        let success = result.is_ok();

        self.metrics
            .record_db_operation(operation, table, duration, success);
        result
    }

    pub fn update_pool_metrics(&self, pool: &sqlx::PgPool) {
        let active = (pool.size() as usize).saturating_sub(pool.num_idle()) as u32;
        let idle = pool.num_idle() as u32;
        self.metrics.update_db_connections(active, idle);
    }
}

/// Performance monitoring for Redis operations
pub struct RedisMetrics {
    metrics: Arc<MetricsCollector>,
}

impl RedisMetrics {
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        Self { metrics }
    }

    pub async fn time_operation<F, T, E>(&self, operation: &str, future: F) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let result = future.await;
        let duration = start.elapsed();
        let success = result.is_ok();

        self.metrics
            .record_redis_operation(operation, duration, success);
        result
    }

    pub fn update_pool_metrics(&self, pool: &deadpool_redis::Pool) {
        let status = pool.status();
        self.metrics
            .update_redis_connections((status.size.saturating_sub(status.available)) as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_metrics_collector_creation() {
        let metrics = MetricsCollector::new().expect("Failed to create metrics collector");
        let metrics_text = metrics.get_metrics().expect("Failed to get metrics");
        assert!(!metrics_text.is_empty());
    }

    #[test]
    fn test_http_metrics_recording() {
        let metrics = MetricsCollector::new().expect("Failed to create metrics collector");

        metrics.record_http_request(
            &Method::GET,
            "/health",
            StatusCode::OK,
            std::time::Duration::from_millis(100),
        );
        metrics.record_http_request(
            &Method::POST,
            "/api/auth/login",
            StatusCode::UNAUTHORIZED,
            std::time::Duration::from_millis(50),
        );

        let metrics_text = metrics.get_metrics().expect("Failed to get metrics");
        assert!(metrics_text.contains("vibarr_http_requests_total"));
        assert!(metrics_text.contains("vibarr_http_request_duration_seconds"));
    }

    #[test]
    fn test_automation_metrics_recording() {
        let metrics = MetricsCollector::new().expect("Failed to create metrics collector");

        metrics.set_job_queue_depth("release-radar", 3);
        metrics.record_job_outcome("release-radar", "success");
        metrics.set_wishlist_count("wanted", 12);
        metrics.set_active_downloads(4);
        metrics.set_rate_limit_tokens("musicbrainz", 0.7);
        metrics.set_circuit_state("prowlarr", 0);

        let metrics_text = metrics.get_metrics().expect("Failed to get metrics");
        assert!(metrics_text.contains("vibarr_scheduler_job_queue_depth"));
        assert!(metrics_text.contains("vibarr_scheduler_jobs_total"));
        assert!(metrics_text.contains("vibarr_wishlist_items_by_status"));
        assert!(metrics_text.contains("vibarr_active_downloads 4"));
        assert!(metrics_text.contains("vibarr_integration_rate_limit_tokens"));
        assert!(metrics_text.contains("vibarr_integration_circuit_state"));
    }
}
