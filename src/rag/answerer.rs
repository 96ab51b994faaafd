//! Grounded answer synthesis over retrieved context.

use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};

/// Canned reply for questions asked before anything relevant was uploaded.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant information in your uploaded \
documents. Please ensure you've uploaded documents that contain the answer.";

pub struct AnswerSynthesizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String, temperature: f32) -> Self {
        Self {
            provider,
            model,
            temperature,
        }
    }

    pub async fn answer(
        &self,
        question: &str,
        context: &str,
        credential: &str,
    ) -> Result<String, ApiError> {
        let prompt = build_prompt(question, context);
        let request = ChatRequest::new(vec![ChatMessage::user(prompt)])
            .with_temperature(f64::from(self.temperature));

        let reply = self.provider.chat(request, &self.model, credential).await?;
        Ok(reply.trim().to_string())
    }
}

fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are Paperbase, a helpful document assistant. Answer based on the context provided.\n\
         \n\
         ## Guidelines:\n\
         - Be concise and direct.\n\
         - Use bullet points for lists.\n\
         - Cite the page markers from the context (e.g. [Page 3]) when they support your answer; \
         never invent citations.\n\
         - If the answer isn't in the context, say \"I couldn't find this information in your \
         documents.\"\n\
         \n\
         Context: {}\n\
         \n\
         Question: {}\n\
         \n\
         Answer:",
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::StubProvider;

    #[test]
    fn prompt_embeds_context_and_question() {
        let prompt = build_prompt("What grew?", "[Page 2] Revenue grew 40%.");

        assert!(prompt.contains("Context: [Page 2] Revenue grew 40%."));
        assert!(prompt.contains("Question: What grew?"));
        assert!(prompt.contains("## Guidelines:"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[tokio::test]
    async fn replies_are_trimmed() {
        let provider = StubProvider::with_reply("  The answer.\n");
        let synthesizer = AnswerSynthesizer::new(provider.clone(), "chat-model".to_string(), 0.3);

        let answer = synthesizer
            .answer("q", "some context", "sk-test")
            .await
            .unwrap();

        assert_eq!(answer, "The answer.");
        assert_eq!(provider.chat_call_count(), 1);
        assert!(provider.prompts()[0].contains("some context"));
    }
}
