//! Worker agents and the inference client they share.
//!
//! # Main types
//!
//! - [`LlmClient`]: Chat completion client dispatching to a provider backend.
//! - [`ModelConfig`]: Provider, model id, endpoint and sampling settings.
//! - [`AgentWorker`]: Blocking-dequeue loop that turns tasks into messages.
//! - [`TaskHandler`]: What a worker does with one task.
//! - [`ScoutAgent`]: `web_scrape` handler.
//! - [`WebSearchAgent`]: `web_search` handler backed by a search API and the LLM.

/// Provider backends.
pub mod backends;
/// Model configuration.
pub mod config;
/// Provider-agnostic chat client.
pub mod llm;
/// Web scraping agent.
pub mod scout;
/// Web search agent.
pub mod web_search;
/// Worker loop and the task handler trait.
pub mod worker;

pub use config::{LlmProvider, ModelConfig};
pub use llm::{ChatMessage, ChatRole, LlmClient};
pub use scout::{ScoutAgent, ScoutConfig};
pub use web_search::{SearchConfig, SearchOutcome, WebSearchAgent};
pub use worker::{AgentWorker, TaskHandler};
