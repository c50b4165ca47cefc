//! Vibarr backend library: shared state, routing, and the handful of
//! top-level endpoints (health/readiness/liveness/metrics/monitoring) that
//! don't belong to any one feature area.

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod monitoring;
pub mod recovery;
pub mod services;

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::health::{liveness_check, readiness_check, HealthCheckConfig, HealthChecker};
use crate::metrics::MetricsCollector;
use crate::middleware::{auth_middleware, create_cors_layer, latency_middleware, tracing_middleware};
use crate::monitoring::MonitoringSystem;
use crate::services::{AuthService, EntityStore, Fanout, IntegrationRegistry, SettingsStore};

/// Everything a handler needs, cheaply cloneable — every field is itself a
/// handle over shared state (a pool, an `Arc`, or a struct of `Arc`s).
#[derive(Clone)]
pub struct AppState {
    pub db_pool: database::DatabasePool,
    pub redis_pool: deadpool_redis::Pool,
    pub entities: EntityStore,
    pub settings: SettingsStore,
    pub integrations: IntegrationRegistry,
    pub fanout: Fanout,
    pub auth: AuthService,
    pub metrics: Arc<MetricsCollector>,
    pub monitoring: Arc<MonitoringSystem>,
}

/// Builds the full router: public auth/health/metrics routes, a bearer-auth
/// gated group for everything else, and the websocket download feed (which
/// authenticates itself via its query-string token rather than the auth
/// middleware).
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register_handler))
        .route("/login", post(handlers::auth::login_handler))
        .route("/setup", post(handlers::auth::setup_handler))
        .route("/setup/status", get(handlers::auth::setup_status_handler))
        .route("/plex/pin", post(handlers::auth::plex_pin_handler))
        .route("/plex/callback", get(handlers::auth::plex_callback_handler));

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me_handler))
        .route("/search/artists", get(handlers::search::search_artists_handler))
        .route("/search/albums", get(handlers::search::search_albums_handler))
        .route("/artists/:id", get(handlers::artists::get_artist_handler))
        .route("/artists/:id/tags", patch(handlers::artists::tag_artist_handler))
        .route("/artists", get(handlers::artists::list_in_library_handler))
        .route("/albums/:id", get(handlers::albums::get_album_handler))
        .route(
            "/albums/:id/mark-in-library",
            post(handlers::albums::mark_in_library_handler),
        )
        .route(
            "/artists/:id/albums",
            get(handlers::albums::list_for_artist_handler),
        )
        .route("/albums/recent", get(handlers::albums::recent_releases_handler))
        .route("/library/artists", get(handlers::library::list_artists_handler))
        .route(
            "/library/artists/:artist_id/tracks",
            get(handlers::library::list_tracks_for_artist_handler),
        )
        .route("/library/sync-status", get(handlers::library::sync_status_handler))
        .route(
            "/discovery/artists/:artist_id/similar",
            get(handlers::discovery::similar_artists_handler),
        )
        .route("/discovery/genres", get(handlers::discovery::genre_artists_handler))
        .route("/recommendations", get(handlers::recommendations::list_handler))
        .route(
            "/recommendations/:id/dismiss",
            post(handlers::recommendations::dismiss_handler),
        )
        .route(
            "/recommendations/:id/click",
            post(handlers::recommendations::mark_clicked_handler),
        )
        .route(
            "/recommendations/generate/daily",
            post(handlers::recommendations::generate_daily_handler),
        )
        .route(
            "/recommendations/generate/discover-weekly",
            post(handlers::recommendations::generate_discover_weekly_handler),
        )
        .route(
            "/recommendations/generate/taste-profile",
            post(handlers::recommendations::update_taste_profile_handler),
        )
        .route("/wishlist", get(handlers::wishlist::list_handler).post(handlers::wishlist::create_handler))
        .route(
            "/wishlist/:id",
            get(handlers::wishlist::get_handler).delete(handlers::wishlist::delete_handler),
        )
        .route("/wishlist/:id/search", post(handlers::wishlist::search_now_handler))
        .route("/downloads", get(handlers::downloads::list_active_handler))
        .route("/downloads/:id", get(handlers::downloads::get_handler))
        .route("/downloads/:id/poll", post(handlers::downloads::poll_handler))
        .route("/downloads/:id/cancel", post(handlers::downloads::cancel_handler))
        .route(
            "/settings/:category",
            get(handlers::settings::list_by_category_handler),
        )
        .route(
            "/settings/:category/:key",
            get(handlers::settings::get_handler).put(handlers::settings::set_handler),
        )
        .route("/stats/me", get(handlers::stats::me_handler))
        .route("/social/shared-profiles", get(handlers::social::shared_profiles_handler))
        .route("/social/privacy", patch(handlers::social::update_privacy_handler))
        .route("/automation/rules", get(handlers::automation::list_handler).post(handlers::automation::create_handler))
        .route(
            "/automation/rules/:id/enabled",
            patch(handlers::automation::set_enabled_handler),
        )
        .route("/automation/rules/:id", delete(handlers::automation::delete_handler))
        .route(
            "/automation/check-playlist-urls",
            post(handlers::automation::check_playlist_urls_handler),
        )
        .layer(from_fn_with_state(state.auth.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check_endpoint))
        .route("/health/live", get(liveness_check_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/monitoring", get(comprehensive_monitoring_endpoint))
        .route("/ws/downloads", get(handlers::ws::downloads_handler))
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        .layer(from_fn_with_state(state.metrics.clone(), latency_middleware))
        .layer(axum::middleware::from_fn(tracing_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer()),
        )
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<health::HealthCheckResponse> {
    let checker = HealthChecker::new(HealthCheckConfig::default());
    let response = checker.check_health(&state.db_pool, &state.redis_pool).await;
    tracing::info!(status = ?response.status, correlation_id = %response.correlation_id, "health check completed");
    Json(response)
}

async fn readiness_check_endpoint(
    State(state): State<AppState>,
) -> Json<health::ReadinessResponse> {
    Json(readiness_check(&state.db_pool, &state.redis_pool).await)
}

async fn liveness_check_endpoint() -> Json<serde_json::Value> {
    let alive = liveness_check().await;
    Json(serde_json::json!({ "status": if alive { "alive" } else { "dead" } }))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    metrics::metrics_handler(State(state.metrics)).await
}

async fn comprehensive_monitoring_endpoint(
    State(state): State<AppState>,
) -> Result<Json<monitoring::MonitoringResponse>> {
    let response = state.monitoring.comprehensive_check(&state.db_pool, &state.redis_pool).await;
    tracing::info!(
        status = ?response.health.status,
        memory_usage_percent = response.system_metrics.memory_usage_percent,
        cpu_usage_percent = response.system_metrics.cpu_usage_percent,
        "comprehensive monitoring check completed"
    );
    Ok(Json(response))
}
