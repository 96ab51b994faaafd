use std::env;
use std::fs;
use std::path::PathBuf;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";
const CUSTOM_CREDENTIAL_HEADER: &str = "x-custom-api-key";

/// Shared secret between this process and the gateway in front of it.
#[derive(Debug, Clone)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    pub fn value(&self) -> &str {
        &self.value
    }
}

pub fn init_session_token() -> SessionToken {
    if let Ok(token) = env::var("PAPERBASE_SESSION_TOKEN") {
        if !token.trim().is_empty() {
            return SessionToken { value: token };
        }
    }

    let token = format!("{}{}", Uuid::new_v4(), Uuid::new_v4());
    let token_path = session_token_path();
    if let Some(parent) = token_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(err) = fs::write(&token_path, &token) {
        tracing::warn!("Failed to write session token: {}", err);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(&token_path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = fs::set_permissions(&token_path, perms);
        }
    }

    SessionToken { value: token }
}

fn session_token_path() -> PathBuf {
    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".paperbase").join(".session_token")
}

pub fn require_api_key(headers: &HeaderMap, expected: &SessionToken) -> Result<(), ApiError> {
    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    if header_value != expected.value() {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

/// The identity gateway validates the user and forwards a stable tenant id
/// as the bearer value; this service trusts it as-is.
pub fn resolve_tenant(headers: &HeaderMap) -> Result<String, ApiError> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let Some(tenant) = authorization.strip_prefix("Bearer ") else {
        tracing::warn!("Auth attempt with invalid scheme");
        return Err(ApiError::Unauthorized);
    };

    let tenant = tenant.trim();
    if tenant.is_empty() {
        tracing::warn!("Auth attempt with empty bearer value");
        return Err(ApiError::Unauthorized);
    }

    Ok(tenant.to_string())
}

/// Optional tenant-supplied model API key; resolved against the configured
/// default at the facade boundary.
pub fn credential_override(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CUSTOM_CREDENTIAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
