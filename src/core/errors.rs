use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Collapses upstream provider/store error text into a short user-facing
/// message. Raw details belong in the log, not in the response body.
pub fn simplify_error<E: std::fmt::Display>(err: E) -> String {
    let raw = err.to_string();
    let lower = raw.to_lowercase();

    if lower.contains("api_key_invalid") || lower.contains("api key not valid") {
        return "Invalid API key".to_string();
    }
    if lower.contains("quota") || lower.contains("rate limit") {
        return "API quota exceeded".to_string();
    }
    if lower.contains("permission") || lower.contains("forbidden") {
        return "API access denied".to_string();
    }
    if lower.contains("not found") {
        return "Resource not found".to_string();
    }

    raw.chars().take(50).collect()
}
