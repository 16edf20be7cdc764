use std::sync::Arc;

use axum::{extract::Extension, routing::{get, post}, Router};
use dp3_history_manager::{HistoryManager, HistoryManagerContext, HousekeepingConfig};
use dp3_history_memdb::{InMemoryDatabase, InMemoryTaskQueue};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod attrspec_loader;
mod config;
mod error;
mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting DP3 history manager service...");

    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    let attr_spec = attrspec_loader::load_dir(std::path::Path::new(&config.attrspec_dir))?;
    tracing::info!(etypes = attr_spec.len(), "attribute spec tree loaded");

    let db: Arc<dyn dp3_history_manager::EntityDatabase> = Arc::new(InMemoryDatabase::new());
    let task_queue: Arc<dyn dp3_history_manager::TaskQueueWriter> = Arc::new(InMemoryTaskQueue::new());

    let ctx = HistoryManagerContext {
        db,
        task_queue,
        attr_spec: Arc::new(attr_spec),
        worker_index: config.worker_index,
        housekeeping: HousekeepingConfig {
            entity_management_tick_minutes: config.entity_management_tick_minutes,
            datapoint_cleaning_tick_minutes: config.datapoint_cleaning_tick_minutes,
        },
    };
    let manager = Arc::new(HistoryManager::new(ctx));
    let _housekeeping_handles = manager.spawn_housekeeping();

    tracing::info!(
        entity_management_tick_minutes = config.entity_management_tick_minutes,
        datapoint_cleaning_tick_minutes = config.datapoint_cleaning_tick_minutes,
        worker_index = config.worker_index,
        "housekeeping scheduled"
    );

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/ingest/{etype}/{attr_id}", post(routes::ingest::ingest_datapoint))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(Extension(Arc::new(config.clone())))
        .layer(Extension(manager));

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
