use std::env;

use serde_json::{Map, Value};

use crate::core::errors::ApiError;

const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";
const DEFAULT_INDEX_API_BASE: &str = "https://api.pinecone.io";

/// Typed view of the merged configuration. Extraction fails fast on missing
/// credentials or inconsistent values so a bad deployment dies at startup
/// instead of at the first request.
#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub index: IndexSettings,
    pub rag: RagSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub embed_model: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    pub dimension: usize,
    pub api_base: String,
    pub index_name: String,
    pub api_key: String,
    pub cloud: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embed_batch_size: usize,
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

impl Settings {
    pub fn from_config(config: &Value) -> Result<Self, ApiError> {
        let root = config
            .as_object()
            .ok_or_else(|| config_error("root", "expected object"))?;

        let llm = parse_llm(section(root, "llm")?)?;
        let index = parse_index(section(root, "index")?)?;
        let rag = parse_rag(section(root, "rag")?)?;
        let server = parse_server(section(root, "server")?)?;

        Ok(Settings {
            llm,
            index,
            rag,
            server,
        })
    }
}

fn parse_llm(section: Option<&Map<String, Value>>) -> Result<LlmSettings, ApiError> {
    let api_key = secret_value(section, "api_key", "PAPERBASE_LLM_API_KEY");
    if api_key.is_empty() {
        return Err(config_error("llm.api_key", "value is required"));
    }

    Ok(LlmSettings {
        base_url: string_or(section, "llm.base_url", "base_url", DEFAULT_LLM_BASE_URL)?,
        api_key,
        chat_model: string_or(section, "llm.chat_model", "chat_model", DEFAULT_CHAT_MODEL)?,
        embed_model: string_or(
            section,
            "llm.embed_model",
            "embed_model",
            DEFAULT_EMBED_MODEL,
        )?,
        request_timeout_secs: u64_or(
            section,
            "llm.request_timeout_secs",
            "request_timeout_secs",
            60,
            1,
            3600,
        )?,
        max_retries: u64_or(section, "llm.max_retries", "max_retries", 3, 0, 10)? as u32,
        temperature: f64_or(section, "llm.temperature", "temperature", 0.3, 0.0, 2.0)? as f32,
    })
}

fn parse_index(section: Option<&Map<String, Value>>) -> Result<IndexSettings, ApiError> {
    let backend = match string_or(section, "index.backend", "backend", "local")?.as_str() {
        "local" => IndexBackend::Local,
        "remote" => IndexBackend::Remote,
        other => {
            return Err(config_error(
                "index.backend",
                &format!("unknown backend '{}', expected 'local' or 'remote'", other),
            ))
        }
    };

    let api_key = secret_value(section, "api_key", "PAPERBASE_INDEX_API_KEY");
    if backend == IndexBackend::Remote && api_key.is_empty() {
        return Err(config_error("index.api_key", "value is required"));
    }

    Ok(IndexSettings {
        backend,
        dimension: u64_or(section, "index.dimension", "dimension", 768, 1, 65_536)? as usize,
        api_base: string_or(section, "index.api_base", "api_base", DEFAULT_INDEX_API_BASE)?,
        index_name: string_or(section, "index.index_name", "index_name", "paperbase")?,
        api_key,
        cloud: string_or(section, "index.cloud", "cloud", "aws")?,
        region: string_or(section, "index.region", "region", "us-east-1")?,
    })
}

fn parse_rag(section: Option<&Map<String, Value>>) -> Result<RagSettings, ApiError> {
    let chunk_size = u64_or(section, "rag.chunk_size", "chunk_size", 1500, 1, 1_000_000)? as usize;
    let chunk_overlap =
        u64_or(section, "rag.chunk_overlap", "chunk_overlap", 150, 0, 1_000_000)? as usize;
    if chunk_overlap >= chunk_size {
        return Err(config_error(
            "rag.chunk_overlap",
            "must be smaller than chunk_size",
        ));
    }

    Ok(RagSettings {
        chunk_size,
        chunk_overlap,
        top_k: u64_or(section, "rag.top_k", "top_k", 8, 1, 1000)? as usize,
        embed_batch_size: u64_or(
            section,
            "rag.embed_batch_size",
            "embed_batch_size",
            100,
            1,
            10_000,
        )? as usize,
        upsert_batch_size: u64_or(
            section,
            "rag.upsert_batch_size",
            "upsert_batch_size",
            100,
            1,
            10_000,
        )? as usize,
    })
}

fn parse_server(section: Option<&Map<String, Value>>) -> Result<ServerSettings, ApiError> {
    let port = u64_or(section, "server.port", "port", 8000, 1, 65_535)? as u16;
    let allowed_origins = match section.and_then(|map| map.get("allowed_origins")) {
        None => Vec::new(),
        Some(Value::Array(items)) => {
            let mut origins = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let Some(origin) = item.as_str() else {
                    return Err(config_error(
                        &format!("server.allowed_origins[{}]", index),
                        "expected string",
                    ));
                };
                origins.push(origin.to_string());
            }
            origins
        }
        Some(_) => {
            return Err(config_error(
                "server.allowed_origins",
                "expected array of strings",
            ))
        }
    };

    Ok(ServerSettings {
        host: string_or(section, "server.host", "host", "127.0.0.1")?,
        port,
        allowed_origins,
    })
}

fn section<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_error(key, "expected object")),
        None => Ok(None),
    }
}

/// Config value first, environment variable second.
fn secret_value(section: Option<&Map<String, Value>>, key: &str, env_var: &str) -> String {
    if let Some(value) = section
        .and_then(|map| map.get(key))
        .and_then(|value| value.as_str())
    {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }

    env::var(env_var)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn string_or(
    section: Option<&Map<String, Value>>,
    path: &str,
    key: &str,
    default: &str,
) -> Result<String, ApiError> {
    match section.and_then(|map| map.get(key)) {
        None => Ok(default.to_string()),
        Some(value) => {
            let Some(text) = value.as_str() else {
                return Err(config_error(path, "expected string"));
            };
            if text.trim().is_empty() {
                return Ok(default.to_string());
            }
            Ok(text.trim().to_string())
        }
    }
}

fn u64_or(
    section: Option<&Map<String, Value>>,
    path: &str,
    key: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ApiError> {
    let Some(value) = section.and_then(|map| map.get(key)) else {
        return Ok(default);
    };
    let Some(number) = value.as_u64() else {
        return Err(config_error(path, "expected integer"));
    };
    if number < min || number > max {
        return Err(config_error(
            path,
            &format!("must be between {} and {}", min, max),
        ));
    }
    Ok(number)
}

fn f64_or(
    section: Option<&Map<String, Value>>,
    path: &str,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> Result<f64, ApiError> {
    let Some(value) = section.and_then(|map| map.get(key)) else {
        return Ok(default);
    };
    let Some(number) = value.as_f64() else {
        return Err(config_error(path, "expected number"));
    };
    if number < min || number > max {
        return Err(config_error(
            path,
            &format!("must be between {} and {}", min, max),
        ));
    }
    Ok(number)
}

fn config_error(path: &str, message: &str) -> ApiError {
    ApiError::BadRequest(format!("Invalid config at '{}': {}", path, message))
}
