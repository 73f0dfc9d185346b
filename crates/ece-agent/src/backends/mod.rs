/// Ollama native chat backend.
pub mod ollama;
/// OpenAI-compatible chat completions backend.
pub mod openai;

use crate::llm::ChatMessage;
use ece_core::{EceError, EceResult};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for LLM provider backends.
///
/// Each provider implements this trait to handle API communication.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `LlmBackend` for your struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Wire it up in `LlmClient::new()` in `llm.rs`
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion returning the reply text.
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> EceResult<String>;
}

pub(crate) fn http_client(timeout_secs: u64) -> EceResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| EceError::Http(format!("Failed to build HTTP client: {e}")))
}

/// Flatten an optional system prompt and the history into wire messages.
pub(crate) fn build_messages(
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
) -> Vec<serde_json::Value> {
    let mut api_messages = Vec::with_capacity(messages.len() + 1);
    if let Some(sys) = system_prompt {
        api_messages.push(serde_json::json!({
            "role": "system",
            "content": sys
        }));
    }
    for m in messages {
        api_messages.push(serde_json::json!({
            "role": m.role,
            "content": m.content
        }));
    }
    api_messages
}
