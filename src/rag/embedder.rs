//! Batched embedding over the configured LLM provider.

use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

pub struct Embedder {
    provider: Arc<dyn LlmProvider>,
    model: String,
    batch_size: usize,
    /// Expected vector dimension; 0 disables the check.
    dimension: usize,
}

impl Embedder {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: String,
        batch_size: usize,
        dimension: usize,
    ) -> Self {
        Self {
            provider,
            model,
            batch_size: batch_size.max(1),
            dimension,
        }
    }

    /// Embeds the texts in request-sized batches. The output is index-aligned
    /// with the input, so `vectors[i]` always belongs to `texts[i]`.
    pub async fn embed_documents(
        &self,
        texts: &[String],
        credential: &str,
    ) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.provider.embed(batch, &self.model, credential).await?;
            if embedded.len() != batch.len() {
                return Err(ApiError::Internal(format!(
                    "Embedding count mismatch: sent {} texts, got {} vectors",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        self.check_dimensions(&vectors)?;
        Ok(vectors)
    }

    pub async fn embed_query(&self, text: &str, credential: &str) -> Result<Vec<f32>, ApiError> {
        let inputs = vec![text.to_string()];
        let vectors = self.provider.embed(&inputs, &self.model, credential).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("Embedding response was empty".to_string()))?;

        self.check_dimensions(std::slice::from_ref(&vector))?;
        Ok(vector)
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<(), ApiError> {
        if self.dimension == 0 {
            return Ok(());
        }
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(ApiError::Internal(format!(
                    "Embedding dimension {} does not match the configured {}",
                    vector.len(),
                    self.dimension
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::StubProvider;

    #[tokio::test]
    async fn batches_preserve_input_order() {
        let provider = StubProvider::new();
        let embedder = Embedder::new(provider.clone(), "embed-model".to_string(), 2, 8);

        let texts: Vec<String> = ["a", "bb", "ccc", "dddd", "eeeee"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let vectors = embedder.embed_documents(&texts, "sk-test").await.unwrap();

        assert_eq!(vectors.len(), texts.len());
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector, &StubProvider::embedding(text));
        }
        // 5 texts at batch size 2 means 3 requests.
        assert_eq!(provider.embed_call_count(), 3);
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let provider = StubProvider::new();
        let embedder = Embedder::new(provider, "embed-model".to_string(), 10, 4);

        let err = embedder
            .embed_documents(&["hello".to_string()], "sk-test")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("dimension"));
    }

    #[tokio::test]
    async fn query_embedding_returns_a_single_vector() {
        let provider = StubProvider::new();
        let embedder = Embedder::new(provider, "embed-model".to_string(), 10, 8);

        let vector = embedder.embed_query("what is it", "sk-test").await.unwrap();

        assert_eq!(vector, StubProvider::embedding("what is it"));
    }
}
