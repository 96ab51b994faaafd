use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// OpenAI-compatible HTTP provider (`/v1/chat/completions` and
/// `/v1/embeddings`). Works against any endpoint speaking that dialect.
pub struct OpenAiProvider {
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(base_url: String, timeout_secs: u64, max_retries: u32) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url,
            client,
            max_retries,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// POSTs the body, retrying 429 / 5xx / transport failures with
    /// exponential backoff up to `max_retries` extra attempts.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &Value,
        credential: &str,
        action: &str,
    ) -> Result<Value, ApiError> {
        let mut last_error = format!("{} request was never sent", action);

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(1u64 << (attempt - 1).min(5));
                tokio::time::sleep(backoff).await;
            }

            let response = self
                .client
                .post(url)
                .bearer_auth(credential)
                .json(body)
                .send()
                .await;

            match response {
                Ok(res) if res.status().is_success() => {
                    return res.json::<Value>().await.map_err(ApiError::internal);
                }
                Ok(res) => {
                    let status = res.status();
                    let text = res.text().await.unwrap_or_default();
                    let message = format!("{} error {}: {}", action, status, text);
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(
                            "Retriable {} failure (attempt {}): {}",
                            action,
                            attempt + 1,
                            status
                        );
                        last_error = message;
                        continue;
                    }
                    return Err(ApiError::Internal(message));
                }
                Err(err) => {
                    tracing::warn!(
                        "Retriable {} failure (attempt {}): {}",
                        action,
                        attempt + 1,
                        err
                    );
                    last_error = format!("{} request failed: {}", action, err);
                }
            }
        }

        Err(ApiError::Internal(last_error))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        request: ChatRequest,
        model_id: &str,
        credential: &str,
    ) -> Result<String, ApiError> {
        let url = self.endpoint("/v1/chat/completions");

        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let payload = self.post_with_retry(&url, &body, credential, "chat").await?;
        let content = extract_content(&payload["choices"][0]["message"]["content"]);
        if content.is_empty() {
            return Err(ApiError::Internal("No content in chat response".to_string()));
        }

        Ok(content)
    }

    async fn embed(
        &self,
        inputs: &[String],
        model_id: &str,
        credential: &str,
    ) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = self.endpoint("/v1/embeddings");
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let payload = self
            .post_with_retry(&url, &body, credential, "embeddings")
            .await?;
        let data = payload["data"]
            .as_array()
            .ok_or_else(|| ApiError::Internal("Malformed embeddings response".to_string()))?;

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let Some(values) = item["embedding"].as_array() else {
                return Err(ApiError::Internal(
                    "Embeddings response item missing embedding".to_string(),
                ));
            };
            vectors.push(
                values
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .map(|v| v as f32)
                    .collect(),
            );
        }

        Ok(vectors)
    }
}

/// Chat `content` may be a plain string or an array of typed parts; text
/// parts are concatenated, everything else is ignored.
fn extract_content(content: &Value) -> String {
    if let Some(text) = content.as_str() {
        return text.to_string();
    }

    if let Some(parts) = content.as_array() {
        return parts
            .iter()
            .filter(|part| part["type"].as_str() == Some("text"))
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("");
    }

    String::new()
}
