use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::{credential_override, require_api_key, resolve_tenant};
use crate::rag::{derive_namespace, UploadedFile};
use crate::state::AppState;

/// Multipart upload: every field with a filename is a document; an optional
/// `conversation_id` text field scopes the batch to one conversation.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;
    let tenant = resolve_tenant(&headers)?;
    let override_key = credential_override(&headers);

    let mut files = Vec::new();
    let mut conversation_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Invalid multipart payload: {}", err)))?
    {
        if let Some(filename) = field.file_name().map(str::to_string) {
            let data = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(format!("Failed reading upload: {}", err)))?;
            files.push(UploadedFile {
                name: filename,
                data: data.to_vec(),
            });
        } else if field.name() == Some("conversation_id") {
            let value = field
                .text()
                .await
                .map_err(|err| ApiError::BadRequest(format!("Failed reading upload: {}", err)))?;
            let value = value.trim();
            if !value.is_empty() {
                conversation_id = Some(value.to_string());
            }
        }
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files in upload".to_string()));
    }

    let namespace = derive_namespace(&tenant, conversation_id.as_deref());
    let report = state
        .rag
        .ingest_files(&namespace, files, override_key.as_deref())
        .await?;

    // Usage counters are best effort; the upload already succeeded.
    if let Err(err) = state
        .conversations
        .bump_stats(
            &tenant,
            report.processed.len() as i64,
            report.token_estimate as i64,
        )
        .await
    {
        tracing::warn!("Failed to update stats for {}: {}", tenant, err);
    }

    Ok(Json(json!({
        "status": "success",
        "processed": report.processed,
        "count": report.chunk_count,
    })))
}
