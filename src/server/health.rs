//! Liveness probe with queue observability.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let queue = &state.inner.queue;
    Json(json!({
        "status": "ok",
        "pending_jobs": queue.pending_count(),
        "failed_jobs": queue.failed_jobs().len(),
    }))
}
