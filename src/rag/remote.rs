//! Remote vector index backend speaking the Pinecone serverless HTTP API.
//!
//! Control-plane calls (describe/create index) go to `api_base`; data-plane
//! calls (upsert/query/delete) go to the per-index host resolved at startup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use super::store::{build_records, Chunk, VectorMatch, VectorStore};
use crate::core::config::settings::IndexSettings;
use crate::core::errors::ApiError;

const READY_POLL_ATTEMPTS: u32 = 30;
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct RemoteIndexStore {
    api_base: String,
    index_name: String,
    api_key: String,
    dimension: usize,
    cloud: String,
    region: String,
    upsert_batch_size: usize,
    client: reqwest::Client,
    host: OnceCell<String>,
}

impl RemoteIndexStore {
    pub fn new(settings: &IndexSettings, upsert_batch_size: usize) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            index_name: settings.index_name.clone(),
            api_key: settings.api_key.clone(),
            dimension: settings.dimension,
            cloud: settings.cloud.clone(),
            region: settings.region.clone(),
            upsert_batch_size: upsert_batch_size.max(1),
            client,
            host: OnceCell::new(),
        })
    }

    /// Resolves the index host, creating the index when it does not exist
    /// yet. Called once at startup so a misconfigured index fails the boot
    /// instead of the first upload.
    pub async fn ensure_ready(&self) -> Result<(), ApiError> {
        self.host().await.map(|_| ())
    }

    async fn host(&self) -> Result<&str, ApiError> {
        self.host
            .get_or_try_init(|| self.resolve_host())
            .await
            .map(|host| host.as_str())
    }

    async fn resolve_host(&self) -> Result<String, ApiError> {
        let describe_url = format!("{}/indexes/{}", self.api_base, self.index_name);
        let res = self
            .client
            .get(&describe_url)
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(ApiError::internal)?;

        let description = if res.status() == StatusCode::NOT_FOUND {
            self.create_index().await?;
            self.await_ready(&describe_url).await?
        } else if res.status().is_success() {
            res.json::<Value>().await.map_err(ApiError::internal)?
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Index lookup error {}: {}",
                status, body
            )));
        };

        let dimension = description["dimension"].as_u64().unwrap_or(0) as usize;
        if dimension != self.dimension {
            return Err(ApiError::Internal(format!(
                "Index '{}' has dimension {} but the configured embedding dimension is {}",
                self.index_name, dimension, self.dimension
            )));
        }

        let host = description["host"].as_str().unwrap_or_default();
        if host.is_empty() {
            return Err(ApiError::Internal(format!(
                "Index '{}' reported no host",
                self.index_name
            )));
        }
        Ok(format!("https://{}", host.trim_start_matches("https://")))
    }

    async fn create_index(&self) -> Result<(), ApiError> {
        let body = json!({
            "name": self.index_name,
            "dimension": self.dimension,
            "metric": "cosine",
            "spec": { "serverless": { "cloud": self.cloud, "region": self.region } },
        });

        let res = self
            .client
            .post(format!("{}/indexes", self.api_base))
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        // Conflict means another instance created it in the meantime.
        if !res.status().is_success() && res.status() != StatusCode::CONFLICT {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Index creation error {}: {}",
                status, text
            )));
        }

        tracing::info!("Created index {}", self.index_name);
        Ok(())
    }

    async fn await_ready(&self, describe_url: &str) -> Result<Value, ApiError> {
        for _ in 0..READY_POLL_ATTEMPTS {
            let res = self
                .client
                .get(describe_url)
                .header("Api-Key", &self.api_key)
                .send()
                .await
                .map_err(ApiError::internal)?;

            if res.status().is_success() {
                let description = res.json::<Value>().await.map_err(ApiError::internal)?;
                if description["status"]["ready"].as_bool().unwrap_or(false) {
                    return Ok(description);
                }
            }

            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        Err(ApiError::Internal(format!(
            "Index '{}' did not become ready in time",
            self.index_name
        )))
    }

    async fn data_plane_post(&self, path: &str, body: &Value) -> Result<reqwest::Response, ApiError> {
        let host = self.host().await?;
        self.client
            .post(format!("{}{}", host, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(ApiError::internal)
    }
}

#[async_trait]
impl VectorStore for RemoteIndexStore {
    /// Batches are independent: a failed batch is logged and the rest still
    /// go through, so one flaky request does not void a whole upload.
    async fn upsert(
        &self,
        namespace: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<(), ApiError> {
        let records = build_records(chunks, vectors);

        for batch in records.chunks(self.upsert_batch_size) {
            let vectors_json: Vec<Value> = batch
                .iter()
                .map(|record| {
                    json!({
                        "id": record.id,
                        "values": record.values,
                        "metadata": record.metadata,
                    })
                })
                .collect();
            let body = json!({ "vectors": vectors_json, "namespace": namespace });

            match self.data_plane_post("/vectors/upsert", &body).await {
                Ok(res) if res.status().is_success() => {}
                Ok(res) => {
                    let status = res.status();
                    let text = res.text().await.unwrap_or_default();
                    tracing::error!("Upsert batch failed with {}: {}", status, text);
                }
                Err(err) => tracing::error!("Upsert batch failed: {}", err),
            }
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        let body = json!({
            "vector": vector,
            "topK": top_k.max(1) as u64,
            "namespace": namespace,
            "includeMetadata": true,
        });

        let res = self.data_plane_post("/query", &body).await?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Query error {}: {}",
                status, text
            )));
        }

        let payload = res.json::<Value>().await.map_err(ApiError::internal)?;
        let matches = payload["matches"].as_array().cloned().unwrap_or_default();

        Ok(matches
            .into_iter()
            .map(|entry| VectorMatch {
                id: entry["id"].as_str().unwrap_or_default().to_string(),
                score: entry["score"].as_f64().unwrap_or(0.0) as f32,
                metadata: entry.get("metadata").cloned().unwrap_or(Value::Null),
            })
            .collect())
    }

    async fn delete_namespace(&self, namespace: &str) {
        let body = json!({ "deleteAll": true, "namespace": namespace });
        match self.data_plane_post("/vectors/delete", &body).await {
            Ok(res) if res.status().is_success() => {}
            // Unknown namespaces come back 404; nothing to clean up then.
            Ok(res) if res.status() == StatusCode::NOT_FOUND => {}
            Ok(res) => tracing::warn!("Failed to clear namespace {}: {}", namespace, res.status()),
            Err(err) => tracing::warn!("Failed to clear namespace {}: {}", namespace, err),
        }
    }

    async fn delete_tenant(&self, tenant_id: &str) {
        let stats = match self.data_plane_post("/describe_index_stats", &json!({})).await {
            Ok(res) if res.status().is_success() => match res.json::<Value>().await {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!("Failed to list namespaces: {}", err);
                    return;
                }
            },
            Ok(res) => {
                tracing::warn!("Failed to list namespaces: {}", res.status());
                return;
            }
            Err(err) => {
                tracing::warn!("Failed to list namespaces: {}", err);
                return;
            }
        };

        let prefix = format!("{}_", tenant_id);
        let namespaces: Vec<String> = stats["namespaces"]
            .as_object()
            .map(|map| {
                map.keys()
                    .filter(|name| name.as_str() == tenant_id || name.starts_with(&prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for namespace in namespaces {
            self.delete_namespace(&namespace).await;
        }
    }
}
