pub mod openai;
pub mod provider;
#[cfg(test)]
pub mod testing;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest, ContentPart, MessageContent};
