//! VectorStore trait and the record model shared by the index backends.
//!
//! Backends are interchangeable: `LocalIndexStore` keeps per-namespace JSON
//! files on disk, `RemoteIndexStore` talks to a hosted index over HTTP.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::ApiError;

/// A chunk of normalized document text with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Sanitized filename this chunk came from.
    pub source: String,
    /// 0-based position of the chunk within its source document.
    pub chunk_index: usize,
    /// 1-based page or slide number; 1 when the format has no pages.
    pub page: u32,
    /// Extra metadata stored alongside the text, e.g. the document type.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// What actually lands in an index: a stable id, the embedding, and flat
/// metadata that carries everything needed to rebuild a citation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Value,
}

/// A scored match returned from a similarity query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Value,
}

/// Abstract interface over vector index backends. Namespaces are opaque
/// strings; a record written under one namespace is never visible from
/// another.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert chunk/embedding pairs into a namespace. A record with the same
    /// `{source}_{chunk_index}` id replaces the previous one, so re-uploading
    /// a file refreshes it instead of duplicating it.
    async fn upsert(
        &self,
        namespace: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<(), ApiError>;

    /// Top-k similarity search within a namespace, best match first.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError>;

    /// Best-effort removal of a whole namespace. Failures are logged by the
    /// implementation, never surfaced to the caller.
    async fn delete_namespace(&self, namespace: &str);

    /// Best-effort removal of a tenant's base namespace plus every
    /// conversation namespace under it.
    async fn delete_tenant(&self, tenant_id: &str);
}

/// Pairs chunks with their embeddings as records ready for upsert. Chunk
/// metadata is flattened last so callers can attach extra keys.
pub fn build_records(chunks: &[Chunk], vectors: &[Vec<f32>]) -> Vec<VectorRecord> {
    chunks
        .iter()
        .zip(vectors.iter())
        .map(|(chunk, values)| {
            let mut metadata = serde_json::Map::new();
            metadata.insert("text".to_string(), Value::String(chunk.text.clone()));
            metadata.insert("source".to_string(), Value::String(chunk.source.clone()));
            metadata.insert(
                "chunk_index".to_string(),
                Value::from(chunk.chunk_index as u64),
            );
            metadata.insert("page".to_string(), Value::from(chunk.page));
            for (key, value) in &chunk.metadata {
                metadata.insert(key.clone(), value.clone());
            }

            VectorRecord {
                id: format!("{}_{}", chunk.source, chunk.chunk_index),
                values: values.clone(),
                metadata: Value::Object(metadata),
            }
        })
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
