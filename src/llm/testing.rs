use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Deterministic offline provider for tests: embeddings are a pure function
/// of the input text and chat replies are canned. Call counters let tests
/// assert that no generative call happened.
pub struct StubProvider {
    chat_reply: String,
    chat_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    credentials: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new() -> Arc<Self> {
        Self::with_reply("stubbed answer")
    }

    pub fn with_reply(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            chat_reply: reply.to_string(),
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            credentials: Mutex::new(Vec::new()),
        })
    }

    pub fn chat_call_count(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn embed_call_count(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Credentials seen across all calls, in call order.
    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }

    /// 8-dimensional vector derived from the text bytes. Identical texts get
    /// identical vectors.
    pub fn embedding(text: &str) -> Vec<f32> {
        let mut acc = [0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            acc[i % 8] += f32::from(byte) / 255.0;
        }
        acc.to_vec()
    }
}

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn chat(
        &self,
        request: ChatRequest,
        _model_id: &str,
        credential: &str,
    ) -> Result<String, ApiError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credential.to_string());
        let rendered = request
            .messages
            .iter()
            .map(|message| message.text())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(rendered);
        Ok(self.chat_reply.clone())
    }

    async fn embed(
        &self,
        inputs: &[String],
        _model_id: &str,
        credential: &str,
    ) -> Result<Vec<Vec<f32>>, ApiError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credential.to_string());
        Ok(inputs.iter().map(|text| Self::embedding(text)).collect())
    }
}
