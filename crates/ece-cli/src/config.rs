use ece_agent::{ModelConfig, ScoutConfig, SearchConfig};
use ece_blackboard::BlackboardConfig;
use ece_memory::GraphConfig;
use ece_orchestrator::{CrewConfig, OrchestratorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Everything `ece` reads from its TOML file. Every section is optional.
#[derive(Debug, Deserialize)]
pub struct EceConfig {
    /// Holds the instance lock.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Cycle timing and working memory.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Message log and queue store.
    #[serde(default)]
    pub blackboard: BlackboardConfig,
    /// Inference models per role.
    #[serde(default)]
    pub models: ModelsConfig,
    /// Distillation crew behaviour.
    #[serde(default)]
    pub crew: CrewConfig,
    /// Long-term memory store.
    #[serde(default)]
    pub graph: GraphConfig,
    /// Scout worker.
    #[serde(default)]
    pub scout: ScoutConfig,
    /// Search worker.
    #[serde(default)]
    pub search: SearchConfig,
}

/// Models used by each role.
#[derive(Debug, Deserialize)]
pub struct ModelsConfig {
    /// Runs each distillation analysis.
    #[serde(default = "default_analyst")]
    pub analyst: ModelConfig,
    /// Writes the archival summary.
    #[serde(default = "default_integrator")]
    pub integrator: ModelConfig,
    /// Answers web search queries.
    #[serde(default = "default_search_model")]
    pub search: ModelConfig,
    /// Summarizes excerpts before archiving; raw excerpts are stored when unset.
    #[serde(default)]
    pub summarizer: Option<ModelConfig>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            analyst: default_analyst(),
            integrator: default_integrator(),
            search: default_search_model(),
            summarizer: None,
        }
    }
}

impl Default for EceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            orchestrator: OrchestratorConfig::default(),
            blackboard: BlackboardConfig::default(),
            models: ModelsConfig::default(),
            crew: CrewConfig::default(),
            graph: GraphConfig::default(),
            scout: ScoutConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_analyst() -> ModelConfig {
    ModelConfig::ollama("phi:latest")
}
fn default_integrator() -> ModelConfig {
    ModelConfig::ollama("mistral:latest")
}
fn default_search_model() -> ModelConfig {
    ModelConfig::ollama("mistral-nemo:12b")
}

impl EceConfig {
    /// Read `path`, falling back to defaults when it does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
            })?;
            toml::from_str(&raw)?
        } else {
            info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Fill secrets that are conventionally supplied through the environment.
    pub fn apply_env(&mut self) {
        if self.search.api_key.is_empty() {
            if let Ok(key) = std::env::var("TAVILY_API_KEY") {
                self.search.api_key = key;
            }
        }
    }
}
