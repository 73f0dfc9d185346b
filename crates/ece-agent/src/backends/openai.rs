use super::{build_messages, http_client, LlmBackend};
use crate::config::ModelConfig;
use crate::llm::ChatMessage;
use async_trait::async_trait;
use ece_core::{EceError, EceResult};

/// OpenAI-compatible API backend.
///
/// Works with OpenAI and any local server that implements the chat
/// completions API (llama.cpp, vLLM, LM Studio).
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Build a backend for an OpenAI-compatible endpoint.
    pub fn new(config: ModelConfig) -> EceResult<Self> {
        let http = http_client(config.request_timeout_secs)?;
        Ok(Self { config, http })
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        // Local servers usually run without a key.
        if self.config.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[ChatMessage],
    ) -> EceResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "messages": build_messages(system_prompt, messages),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
        });

        let resp = self
            .add_provider_headers(self.http.post(&url))
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
                "OpenAI API error {status}: {error_body}"
            )));
        }

        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EceError::Http(e.to_string()))?;
        parse_openai_response(&resp_body)
    }
}

pub(crate) fn parse_openai_response(body: &serde_json::Value) -> EceResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EceError::Http(format!("Malformed chat completion response: {body}")))
}
