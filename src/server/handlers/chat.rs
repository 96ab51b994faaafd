use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::{credential_override, require_api_key, resolve_tenant};
use crate::rag::derive_namespace;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let tenant = resolve_tenant(&headers)?;
    let override_key = credential_override(&headers);

    let question = payload.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Question must not be empty".to_string()));
    }

    let namespace = derive_namespace(&tenant, payload.conversation_id.as_deref());
    let reply = state
        .rag
        .ask(&namespace, question, override_key.as_deref())
        .await?;

    // History writes never fail the answer that was already produced.
    if let Err(err) = state
        .conversations
        .append(
            &tenant,
            payload.conversation_id.as_deref(),
            question,
            &reply.answer,
            &reply.context,
        )
        .await
    {
        tracing::warn!("Failed to save conversation for {}: {}", tenant, err);
    }

    Ok(Json(json!({ "answer": reply.answer })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let tenant = resolve_tenant(&headers)?;

    let entries = state.conversations.recent(&tenant, query.limit).await?;
    Ok(Json(json!({ "history": entries })))
}
