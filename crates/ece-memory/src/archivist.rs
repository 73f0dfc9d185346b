use crate::graph::GraphStore;
use crate::working_memory::read_last_n_chars;
use ece_agent::LlmClient;
use ece_core::EceResult;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Statement that persists one memory node; the store assigns the timestamp.
pub const ADD_MEMORY_NODE: &str = "CREATE (m:Memory {content: $content, timestamp: timestamp()})";

const SUMMARY_PROMPT: &str = "Summarize the following excerpt of an ongoing working-memory \
document into a concise memory entry. Keep names, decisions and open questions.\n\n";

/// Persists working-memory excerpts as `Memory` nodes.
pub struct Archivist {
    graph: Arc<dyn GraphStore>,
    summarizer: Option<LlmClient>,
}

impl Archivist {
    /// Archivist writing to `graph`, storing excerpts verbatim.
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            graph,
            summarizer: None,
        }
    }

    /// Summarize each excerpt with `llm` before storing it.
    pub fn with_summarizer(mut self, llm: LlmClient) -> Self {
        self.summarizer = Some(llm);
        self
    }

    /// Create one `Memory` node holding `content`.
    pub async fn add_memory_node(&self, content: &str) -> EceResult<()> {
        let mut params = Map::new();
        params.insert("content".into(), Value::from(content));
        self.graph.query(ADD_MEMORY_NODE, Some(params)).await?;
        Ok(())
    }

    /// Archive the last `chars` characters of the document at `path`.
    ///
    /// Returns `false` without touching the graph when there is nothing to
    /// archive.
    pub async fn archive_from_working_memory(&self, path: &Path, chars: usize) -> EceResult<bool> {
        let excerpt = read_last_n_chars(path, chars).await;
        if excerpt.trim().is_empty() {
            info!(path = %path.display(), "Working memory is empty or unreadable, nothing to archive");
            return Ok(false);
        }

        let content = match &self.summarizer {
            Some(llm) => {
                let summary = llm.generate(&format!("{SUMMARY_PROMPT}{excerpt}")).await?;
                summary.trim().to_string()
            }
            None => excerpt,
        };

        self.add_memory_node(&content).await?;
        info!(path = %path.display(), chars = content.chars().count(), "Memory archived");
        Ok(true)
    }
}
