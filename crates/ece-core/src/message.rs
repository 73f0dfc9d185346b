use serde::{Deserialize, Serialize};

/// A single entry of the shared message log.
///
/// Wire shape: `{"source_agent": string, "content": string}`. Ordering is
/// implied by the position in the log; there is no explicit timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackboardMessage {
    /// Identity of the agent (or collaborator) that posted the message.
    pub source_agent: String,
    /// Free-form textual content.
    pub content: String,
}

impl BlackboardMessage {
    /// Creates a message attributed to `source_agent`.
    pub fn new(source_agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source_agent: source_agent.into(),
            content: content.into(),
        }
    }
}

/// A task posted to a named queue.
///
/// Wire shape: `{"type": string, ...arbitrary fields}`. Extra fields are kept
/// verbatim and flattened next to `type` on serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    /// Task kind, e.g. `web_scrape`.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Remaining key-valued payload.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl TaskPayload {
    /// Creates a task with no extra fields.
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            fields: serde_json::Map::new(),
        }
    }

    /// Builder-style setter for one payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Returns a payload field as a string slice, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(serde_json::Value::as_str)
    }
}
