use crate::backends::ollama::OllamaBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use ece_core::EceResult;
use serde::{Deserialize, Serialize};

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions for the model.
    System,
    /// Input from the caller.
    User,
    /// A previous model reply.
    Assistant,
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who said it.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// LLM client that dispatches to the correct provider backend.
///
/// Every agent in the engine talks to its model through this type, so tests
/// can swap the network for a scripted backend with [`LlmClient::from_backend`].
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
}

impl LlmClient {
    /// Create a client for the provider named in `config`.
    pub fn new(config: ModelConfig) -> EceResult<Self> {
        let backend: Box<dyn LlmBackend> = match config.provider {
            LlmProvider::Ollama => Box::new(OllamaBackend::new(config)?),
            LlmProvider::OpenAi => Box::new(OpenAiBackend::new(config)?),
        };
        Ok(Self { backend })
    }

    /// Create from a pre-built backend (for custom/external providers).
    pub fn from_backend(backend: Box<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Non-streaming chat completion.
    pub async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> EceResult<String> {
        self.backend.chat(system_prompt, messages).await
    }

    /// Single-prompt completion without a system prompt.
    pub async fn generate(&self, prompt: &str) -> EceResult<String> {
        self.backend.chat(None, &[ChatMessage::user(prompt)]).await
    }
}
