use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use chrono::{DateTime, Utc};
use dp3_history_core::{Datapoint, Value};
use dp3_history_manager::HistoryManager;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::ApiError;

/// Request body for the demo ingest endpoint. A thin JSON mapping onto
/// `Datapoint::new_plain`'s arguments; this endpoint exists only so the
/// pipeline is exercisable locally. The production HTTP/WSGI receiver in
/// front of it is out of scope here.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub eid: String,
    pub v: JsonValue,
    #[serde(default = "default_confidence")]
    pub c: f64,
    #[serde(default)]
    pub src: String,
    pub t1: DateTime<Utc>,
    pub t2: DateTime<Utc>,
}

fn default_confidence() -> f64 {
    1.0
}

/// POST /ingest/{etype}/{attr_id}
pub async fn ingest_datapoint(
    Extension(manager): Extension<Arc<HistoryManager>>,
    Path((etype, attr_id)): Path<(String, String)>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let dp = Datapoint::new_plain(
        uuid::Uuid::new_v4().to_string(),
        req.eid,
        Value::Json(req.v),
        req.c,
        req.src,
        req.t1,
        req.t2,
    );

    manager.process_datapoint(&etype, &attr_id, dp).await?;

    Ok(Json(json!({ "status": "accepted" })))
}
