use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // A trivial read doubles as the database liveness probe.
    let db = match state.conversations.stats("__health__").await {
        Ok(_) => "connected",
        Err(_) => "unavailable",
    };

    Json(json!({
        "status": "ok",
        "db": db
    }))
}
