use crate::worker::TaskHandler;
use async_trait::async_trait;
use ece_core::{EceError, EceResult, TaskPayload};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Task type accepted by [`ScoutAgent`].
pub const WEB_SCRAPE: &str = "web_scrape";

/// Settings for the scraping agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Queue the scout worker serves.
    #[serde(default = "default_queue")]
    pub queue_name: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Scraped text is cut to this many characters.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Reduce HTML pages to their visible text.
    #[serde(default = "default_true")]
    pub strip_html: bool,
}

fn default_queue() -> String {
    "scout_tasks".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_chars() -> usize {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue(),
            timeout_secs: default_timeout_secs(),
            max_chars: default_max_chars(),
            strip_html: default_true(),
        }
    }
}

/// Fetches a web page for a `web_scrape` task and returns its text.
pub struct ScoutAgent {
    config: ScoutConfig,
    client: reqwest::Client,
    hidden_blocks: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl ScoutAgent {
    /// Build the HTTP client and the HTML stripping patterns.
    pub fn new(config: ScoutConfig) -> EceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| EceError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            hidden_blocks: compile(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")?,
            tags: compile(r"(?s)<[^>]*>")?,
            whitespace: compile(r"\s+")?,
        })
    }

    /// GET `url` and return its (optionally HTML-stripped, truncated) body.
    pub async fn scrape(&self, url: &str) -> EceResult<String> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| EceError::Agent(format!("Invalid URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EceError::Agent(format!(
                "Unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        debug!(url = %parsed, "Scraping");
        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| EceError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EceError::Http(format!("GET {url} returned {status}")));
        }

        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("html"));
        let body = resp
            .text()
            .await
            .map_err(|e| EceError::Http(e.to_string()))?;

        let text = if self.config.strip_html && is_html {
            self.visible_text(&body)
        } else {
            body
        };
        let text = truncate_chars(&text, self.config.max_chars);
        info!(url = %url, chars = text.chars().count(), "Scrape complete");
        Ok(text)
    }

    fn visible_text(&self, html: &str) -> String {
        let without_blocks = self.hidden_blocks.replace_all(html, " ");
        let without_tags = self.tags.replace_all(&without_blocks, " ");
        self.whitespace
            .replace_all(&without_tags, " ")
            .trim()
            .to_string()
    }
}

fn compile(pattern: &str) -> EceResult<Regex> {
    Regex::new(pattern).map_err(|e| EceError::Config(format!("Invalid pattern: {e}")))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[async_trait]
impl TaskHandler for ScoutAgent {
    fn identity(&self) -> &str {
        "ScoutAgent"
    }

    fn queue_name(&self) -> &str {
        &self.config.queue_name
    }

    async fn handle(&self, task: &TaskPayload) -> EceResult<String> {
        if task.task_type != WEB_SCRAPE {
            return Err(EceError::Agent(format!(
                "ScoutAgent cannot handle task type '{}'",
                task.task_type
            )));
        }
        let url = task
            .str_field("url")
            .ok_or_else(|| EceError::Agent("web_scrape task has no 'url'".into()))?;
        self.scrape(url).await
    }
}
