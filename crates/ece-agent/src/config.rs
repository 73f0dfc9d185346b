use serde::{Deserialize, Serialize};

/// Inference server flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama's native `/api/chat` endpoint.
    Ollama,
    /// Any OpenAI-compatible `/v1/chat/completions` server (OpenAI, llama.cpp, vLLM).
    OpenAi,
}

/// Settings for one model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which API dialect to speak.
    pub provider: LlmProvider,
    /// Model name as the provider knows it.
    pub model_id: String,
    /// Bearer token; empty means no auth header.
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default endpoint.
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_timeout_secs() -> u64 {
    120
}

impl ModelConfig {
    /// A local Ollama model with default settings.
    pub fn ollama(model_id: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model_id: model_id.into(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_timeout_secs(),
        }
    }

    /// Override the endpoint base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Endpoint root without a trailing slash.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::Ollama => "http://localhost:11434",
                LlmProvider::OpenAi => "https://api.openai.com",
            }
        }
    }
}
