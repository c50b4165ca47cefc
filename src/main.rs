use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vibarr::config::AppConfig;
use vibarr::database::{create_pool, create_redis_pool, run_migrations, wait_for_database};
use vibarr::metrics::MetricsCollector;
use vibarr::monitoring::{MonitoringConfig, MonitoringSystem};
use vibarr::services::auth::AuthService;
use vibarr::services::entity_store::EntityStore;
use vibarr::services::fanout::Fanout;
use vibarr::services::integrations::IntegrationRegistry;
use vibarr::services::scheduler::jobs::{build_job_table, SchedulerContext};
use vibarr::services::scheduler::Dispatcher;
use vibarr::services::settings::SettingsStore;
use vibarr::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "vibarr=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;

    tracing::info!(environment = ?config.environment, "starting vibarr");

    let db_pool = create_pool(&config.database).await?;
    wait_for_database(&db_pool, 10).await?;
    run_migrations(&db_pool).await?;

    let redis_pool = create_redis_pool(&config.redis).await?;

    let entities = EntityStore::new(db_pool.clone());
    let settings = SettingsStore::load(db_pool.clone(), redis_pool.clone()).await?;
    let integrations = IntegrationRegistry::from_settings(&settings).await;
    let fanout = Fanout::new(redis_pool.clone(), config.redis.url.clone());
    let auth = AuthService::new(entities.users.clone(), config.auth.clone());

    let metrics = Arc::new(MetricsCollector::new().map_err(|e| anyhow::anyhow!("failed to create metrics collector: {e}"))?);
    let monitoring = Arc::new(MonitoringSystem::new(MonitoringConfig::default())?);

    let fanout_runner = fanout.clone();
    tokio::spawn(async move { fanout_runner.run().await });

    let scheduler_context = SchedulerContext {
        entities: entities.clone(),
        settings: settings.clone(),
        integrations: integrations.clone(),
        fanout: fanout.clone(),
    };
    let dispatcher = Dispatcher::new(build_job_table(), scheduler_context);
    tokio::spawn(dispatcher.run());

    let state = AppState {
        db_pool: db_pool.clone(),
        redis_pool: redis_pool.clone(),
        entities,
        settings,
        integrations,
        fanout,
        auth,
        metrics,
        monitoring,
    };

    let app = create_router(state);

    let bind_address = config.server.bind_address();
    tracing::info!(address = %bind_address, "listening");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
