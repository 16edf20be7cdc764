use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use serde_json::{json, Value};

use crate::config::Config;

/// GET /health — liveness probe reporting basic worker identity.
pub async fn health_check(Extension(config): Extension<Arc<Config>>) -> Json<Value> {
    Json(json!({
        "app_name": config.app_name,
        "status": "ok",
        "worker_index": config.worker_index,
    }))
}
