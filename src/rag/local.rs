//! Filesystem-backed vector store for offline and development use.
//!
//! Each namespace is a directory under the index root holding a single
//! `records.json`; queries are brute-force cosine over the loaded records.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::store::{
    build_records, cosine_similarity, Chunk, VectorMatch, VectorRecord, VectorStore,
};
use crate::core::errors::ApiError;

pub struct LocalIndexStore {
    root: PathBuf,
    /// One lock per namespace so concurrent uploads into the same namespace
    /// serialize their read-modify-write, while other namespaces proceed.
    /// Entries are created on first use and dropped when the namespace is
    /// deleted.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LocalIndexStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn namespace_lock(&self, namespace: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn records_path(&self, namespace: &str) -> PathBuf {
        self.namespace_dir(namespace).join("records.json")
    }

    async fn load_records(&self, namespace: &str) -> Result<Vec<VectorRecord>, ApiError> {
        let path = self.records_path(namespace);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                ApiError::Internal(format!("Corrupt index file {}: {}", path.display(), err))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(ApiError::internal(err)),
        }
    }

    async fn save_records(
        &self,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<(), ApiError> {
        tokio::fs::create_dir_all(self.namespace_dir(namespace))
            .await
            .map_err(ApiError::internal)?;
        let bytes = serde_json::to_vec(records).map_err(ApiError::internal)?;
        tokio::fs::write(self.records_path(namespace), bytes)
            .await
            .map_err(ApiError::internal)?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalIndexStore {
    async fn upsert(
        &self,
        namespace: &str,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<(), ApiError> {
        let incoming = build_records(chunks, vectors);
        if incoming.is_empty() {
            return Ok(());
        }

        let lock = self.namespace_lock(namespace).await;
        let _guard = lock.lock().await;

        let mut records = self.load_records(namespace).await?;
        for record in incoming {
            match records.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            }
        }

        self.save_records(namespace, &records).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<VectorMatch>, ApiError> {
        let records = self.load_records(namespace).await?;

        let mut matches: Vec<VectorMatch> = records
            .into_iter()
            .map(|record| VectorMatch {
                score: cosine_similarity(vector, &record.values),
                id: record.id,
                metadata: record.metadata,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k.max(1));

        Ok(matches)
    }

    async fn delete_namespace(&self, namespace: &str) {
        let lock = self.namespace_lock(namespace).await;
        {
            let _guard = lock.lock().await;
            if let Err(err) = tokio::fs::remove_dir_all(self.namespace_dir(namespace)).await {
                if err.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to delete namespace {}: {}", namespace, err);
                }
            }
        }

        let mut locks = self.locks.lock().await;
        locks.remove(namespace);
    }

    async fn delete_tenant(&self, tenant_id: &str) {
        let prefix = format!("{}_", tenant_id);

        let mut namespaces = Vec::new();
        match tokio::fs::read_dir(&self.root).await {
            Ok(mut entries) => {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name == tenant_id || name.starts_with(&prefix) {
                        namespaces.push(name);
                    }
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => tracing::warn!("Failed to scan index root: {}", err),
        }

        for namespace in namespaces {
            self.delete_namespace(&namespace).await;
        }
    }
}
