use super::{build_messages, http_client, LlmBackend};
use crate::config::ModelConfig;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use ece_core::{EceError, EceResult};

/// Ollama `/api/chat` backend.
pub struct OllamaBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OllamaBackend {
    /// Build a backend for an Ollama server.
    pub fn new(config: ModelConfig) -> EceResult<Self> {
        let http = http_client(config.request_timeout_secs)?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> EceResult<String> {
        let url = format!("{}/api/chat", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "messages": build_messages(system_prompt, messages),
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            },
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EceError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EceError::Http(format!(
                "Ollama API error {status}: {error_body}"
            )));
        }

        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EceError::Http(e.to_string()))?;
        resp_body["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EceError::Http(format!("Malformed Ollama response: {resp_body}")))
    }
}
