use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Chat + embedding access behind one seam so the pipeline can be exercised
/// with a stub. `credential` is the already-resolved API key for the call;
/// the facade decides between the configured default and a per-request
/// override before anything reaches a provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Chat completion (non-streaming). Returns the text of the first
    /// choice; providers normalize string-or-parts content into a string.
    async fn chat(
        &self,
        request: ChatRequest,
        model_id: &str,
        credential: &str,
    ) -> Result<String, ApiError>;

    /// Embeds every input, preserving order.
    async fn embed(
        &self,
        inputs: &[String],
        model_id: &str,
        credential: &str,
    ) -> Result<Vec<Vec<f32>>, ApiError>;
}
