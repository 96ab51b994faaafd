use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::{simplify_error, ApiError};
use crate::core::security::{require_api_key, resolve_tenant};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyKeyRequest {
    pub api_key: String,
}

/// Checks a tenant-supplied model key with the cheapest possible live call.
pub async fn verify_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<VerifyKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    resolve_tenant(&headers)?;

    let key = payload.api_key.trim();
    if key.is_empty() {
        return Err(ApiError::BadRequest("API key must not be empty".to_string()));
    }

    state.rag.verify_credential(key).await.map_err(|err| {
        tracing::warn!("Key verification failed: {}", err);
        ApiError::BadRequest(format!("Invalid key: {}", simplify_error(err)))
    })?;

    Ok(Json(json!({ "status": "valid" })))
}
