use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;
use crate::metrics::MetricsSnapshot;

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
