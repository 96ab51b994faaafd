use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::{require_api_key, resolve_tenant};
use crate::rag::derive_namespace;
use crate::state::AppState;

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let tenant = resolve_tenant(&headers)?;

    let stats = state.conversations.stats(&tenant).await?;
    Ok(Json(json!({
        "files_processed": stats.files_processed,
        "tokens_used": stats.tokens_used,
    })))
}

/// Deltas, not absolutes: the frontend reports usage it observed and the
/// counters accumulate.
#[derive(Debug, Deserialize)]
pub struct StatsPatch {
    #[serde(default)]
    pub files_processed: i64,
    #[serde(default)]
    pub tokens_used: i64,
}

pub async fn update_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<StatsPatch>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let tenant = resolve_tenant(&headers)?;

    state
        .conversations
        .bump_stats(&tenant, payload.files_processed, payload.tokens_used)
        .await?;

    let stats = state.conversations.stats(&tenant).await?;
    Ok(Json(json!({
        "files_processed": stats.files_processed,
        "tokens_used": stats.tokens_used,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ClearDataQuery {
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// With a conversation id, clears that conversation's documents and history;
/// without one, clears the tenant's account-wide documents.
pub async fn clear_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ClearDataQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let tenant = resolve_tenant(&headers)?;

    match query
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        Some(conversation_id) => {
            let namespace = derive_namespace(&tenant, Some(conversation_id));
            state.rag.clear_namespace(&namespace).await;
            if let Err(err) = state
                .conversations
                .delete_conversation(&tenant, conversation_id)
                .await
            {
                tracing::warn!("Failed to delete conversation history for {}: {}", tenant, err);
            }
        }
        None => state.rag.clear_namespace(&tenant).await,
    }

    Ok(Json(json!({ "message": "Data cleared" })))
}

pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let tenant = resolve_tenant(&headers)?;

    state.rag.delete_tenant_data(&tenant).await;
    state.conversations.delete_user(&tenant).await?;

    Ok(Json(json!({ "message": "Account deleted" })))
}
