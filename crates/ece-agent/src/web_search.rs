use crate::llm::{ChatMessage, LlmClient};
use crate::worker::TaskHandler;
use async_trait::async_trait;
use ece_core::{EceError, EceResult, TaskPayload};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Task type accepted by [`WebSearchAgent`].
pub const WEB_SEARCH: &str = "web_search";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant that answers questions based on web search results.";

/// Settings for the search provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Queue the search worker serves.
    #[serde(default = "default_queue")]
    pub queue_name: String,
    /// Tavily-compatible API root; requests go to `<api_url>/search`.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Provider API key.
    #[serde(default)]
    pub api_key: String,
    /// `basic` or `advanced`.
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    /// Maximum hits requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// System prompt for the answering model.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_queue() -> String {
    "search_tasks".into()
}

fn default_api_url() -> String {
    "https://api.tavily.com".into()
}

fn default_search_depth() -> String {
    "advanced".into()
}

fn default_max_results() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue(),
            api_url: default_api_url(),
            api_key: String::new(),
            search_depth: default_search_depth(),
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Result of one search. Failures are described in `answer`, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Whether an answer was produced.
    pub success: bool,
    /// The answer, or human-readable failure text.
    pub answer: String,
    /// URLs of the hits the answer was drawn from.
    pub websites_searched: Vec<String>,
    /// Short failure classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    fn failed(answer: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            answer: answer.into(),
            websites_searched: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    content: String,
}

/// Answers a query from web search results using the configured model.
pub struct WebSearchAgent {
    config: SearchConfig,
    client: reqwest::Client,
    llm: LlmClient,
}

impl WebSearchAgent {
    /// Create an agent answering through `llm`.
    pub fn new(config: SearchConfig, llm: LlmClient) -> EceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EceError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client, llm })
    }

    /// Search the web for `query` and answer it from the hits.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        info!(query = %query, "Web search");

        let url = format!("{}/search", self.config.api_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "api_key": self.config.api_key,
            "query": query,
            "search_depth": self.config.search_depth,
            "max_results": self.config.max_results,
        });

        let resp = match self.client.post(&url).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!(url = %url, error = %e, "Search request failed");
                return SearchOutcome::failed(
                    "A web search error occurred (could not connect).",
                    "Connection error",
                );
            }
        };

        let status = resp.status();
        if !status.is_success() {
            error!(url = %url, status = status.as_u16(), "Search provider returned an error");
            return SearchOutcome::failed(
                format!("A web search error occurred (HTTP {}).", status.as_u16()),
                format!("HTTP error {}", status.as_u16()),
            );
        }

        let hits = match resp.json::<SearchResponse>().await {
            Ok(parsed) => parsed.results,
            Err(e) => {
                error!(error = %e, "Unreadable search response");
                return SearchOutcome::failed(
                    "An unexpected error occurred during web search.",
                    e.to_string(),
                );
            }
        };

        let context = hits
            .iter()
            .map(|hit| hit.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let websites_searched: Vec<String> = hits.into_iter().map(|hit| hit.url).collect();
        let prompt = format!(
            "Based on the following context, please answer the user's query.\n\nContext:\n{context}\n\nQuery:\n{query}"
        );

        match self
            .llm
            .chat(Some(&self.config.system_prompt), &[ChatMessage::user(prompt)])
            .await
        {
            Ok(answer) => SearchOutcome {
                success: true,
                answer,
                websites_searched,
                error: None,
            },
            Err(e) => {
                error!(error = %e, "Answer generation failed");
                SearchOutcome::failed(
                    "An unexpected error occurred during web search.",
                    e.to_string(),
                )
            }
        }
    }
}

#[async_trait]
impl TaskHandler for WebSearchAgent {
    fn identity(&self) -> &str {
        "WebSearchAgent"
    }

    fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    async fn handle(&self, task: &TaskPayload) -> EceResult<String> {
        if task.task_type != WEB_SEARCH {
            return Err(EceError::Agent(format!(
                "WebSearchAgent cannot handle task type '{}'",
                task.task_type
            )));
        }
        let query = task
            .str_field("query")
            .ok_or_else(|| EceError::Agent("web_search task has no 'query'".into()))?;

        let outcome = self.search(query).await;
        if !outcome.success {
            return Err(EceError::Agent(outcome.answer));
        }
        if outcome.websites_searched.is_empty() {
            Ok(outcome.answer)
        } else {
            Ok(format!(
                "{}\n\nSources: {}",
                outcome.answer,
                outcome.websites_searched.join(", ")
            ))
        }
    }
}
