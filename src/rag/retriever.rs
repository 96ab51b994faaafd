//! Similarity retrieval: embed the question, query the store, return the
//! matched chunk texts with their page markers.

use std::sync::Arc;

use super::embedder::Embedder;
use super::store::VectorStore;
use crate::core::errors::ApiError;

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Returns the top-k chunk texts for the question, best first. Each
    /// passage carries a `[Page n]` marker so the answer model can cite it;
    /// texts that already start with a marker are left alone.
    pub async fn retrieve(
        &self,
        question: &str,
        namespace: &str,
        top_k: usize,
        credential: &str,
    ) -> Result<Vec<String>, ApiError> {
        let vector = self.embedder.embed_query(question, credential).await?;
        let matches = self.store.query(namespace, &vector, top_k).await?;

        let mut passages = Vec::new();
        for entry in matches {
            let Some(text) = entry.metadata.get("text").and_then(|value| value.as_str()) else {
                tracing::warn!("Skipping match {} without text metadata", entry.id);
                continue;
            };

            let page = entry.metadata.get("page").and_then(|value| value.as_u64());
            let passage = match page {
                Some(page) if !text.starts_with("[Page") => format!("[Page {}] {}", page, text),
                _ => text.to_string(),
            };
            passages.push(passage);
        }

        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::StubProvider;
    use crate::rag::local::LocalIndexStore;
    use crate::rag::store::{Chunk, VectorRecord};
    use std::collections::BTreeMap;

    fn retriever_over(dir: &std::path::Path) -> Retriever {
        let store = Arc::new(LocalIndexStore::new(dir.to_path_buf()));
        let embedder = Arc::new(Embedder::new(
            StubProvider::new(),
            "embed-model".to_string(),
            100,
            8,
        ));
        Retriever::new(store, embedder)
    }

    fn chunk(text: &str, page: u32, index: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: "doc.txt".to_string(),
            chunk_index: index,
            page,
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn passages_carry_page_markers_without_doubling() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalIndexStore::new(dir.path().to_path_buf());

        let bare = chunk("benchmark results were strong", 3, 0);
        let marked = chunk("[Page 2]\nrevenue grew in Q3", 2, 1);
        let vectors = vec![
            StubProvider::embedding(&bare.text),
            StubProvider::embedding(&marked.text),
        ];
        store.upsert("alice", &[bare, marked], &vectors).await.unwrap();

        let retriever = retriever_over(dir.path());
        let passages = retriever
            .retrieve("what about results", "alice", 5, "sk-test")
            .await
            .unwrap();

        assert_eq!(passages.len(), 2);
        assert!(passages
            .iter()
            .any(|p| p == "[Page 3] benchmark results were strong"));
        assert!(passages.iter().any(|p| p == "[Page 2]\nrevenue grew in Q3"));
        assert!(passages.iter().all(|p| !p.contains("[Page 2] [Page")));
    }

    #[tokio::test]
    async fn matches_without_text_metadata_are_skipped() {
        let dir = tempfile::tempdir().unwrap();

        // Write a namespace file directly so one record lacks text metadata.
        let records = vec![
            VectorRecord {
                id: "doc.txt_0".to_string(),
                values: StubProvider::embedding("usable"),
                metadata: serde_json::json!({ "text": "usable", "page": 1 }),
            },
            VectorRecord {
                id: "doc.txt_1".to_string(),
                values: StubProvider::embedding("orphaned"),
                metadata: serde_json::json!({ "source": "doc.txt" }),
            },
        ];
        let namespace_dir = dir.path().join("alice");
        std::fs::create_dir_all(&namespace_dir).unwrap();
        std::fs::write(
            namespace_dir.join("records.json"),
            serde_json::to_vec(&records).unwrap(),
        )
        .unwrap();

        let retriever = retriever_over(dir.path());
        let passages = retriever
            .retrieve("anything", "alice", 5, "sk-test")
            .await
            .unwrap();

        assert_eq!(passages, vec!["[Page 1] usable".to_string()]);
    }

    #[tokio::test]
    async fn empty_namespace_returns_no_passages() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = retriever_over(dir.path());

        let passages = retriever
            .retrieve("anything", "nobody", 5, "sk-test")
            .await
            .unwrap();

        assert!(passages.is_empty());
    }
}
