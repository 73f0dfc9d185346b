use async_trait::async_trait;
use ece_core::{EceError, EceResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Cypher-speaking persistent store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Run one statement and return the store's raw result.
    async fn query(&self, cypher: &str, params: Option<Map<String, Value>>) -> EceResult<Value>;
}

/// Which graph backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    /// Neo4j over its HTTP transactional API.
    #[default]
    Neo4j,
    /// Process-local recorder, for offline runs.
    Memory,
}

/// Graph store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Store implementation.
    #[serde(default)]
    pub backend: GraphBackend,
    /// HTTP root of the server, e.g. `http://localhost:7474`.
    #[serde(default = "default_uri")]
    pub uri: String,
    /// Database name in the commit URL.
    #[serde(default = "default_database")]
    pub database: String,
    /// Basic auth user.
    #[serde(default = "default_user")]
    pub user: String,
    /// Basic auth password.
    #[serde(default)]
    pub password: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_uri() -> String {
    "http://localhost:7474".into()
}

fn default_database() -> String {
    "neo4j".into()
}

fn default_user() -> String {
    "neo4j".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::default(),
            uri: default_uri(),
            database: default_database(),
            user: default_user(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GraphConfig {
    /// Open the configured backend. An unreachable Neo4j server is fatal.
    pub async fn open_store(&self) -> EceResult<Arc<dyn GraphStore>> {
        Ok(match self.backend {
            GraphBackend::Neo4j => Arc::new(Neo4jHttpStore::connect(self).await?),
            GraphBackend::Memory => Arc::new(InMemoryGraphStore::new()),
        })
    }
}

/// Neo4j client over the HTTP transactional endpoint.
pub struct Neo4jHttpStore {
    http: reqwest::Client,
    commit_url: String,
    user: String,
    password: String,
}

impl Neo4jHttpStore {
    /// Build the client and probe the server once. No retry.
    pub async fn connect(config: &GraphConfig) -> EceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EceError::Graph(format!("Failed to build HTTP client: {e}")))?;
        let root = config.uri.trim_end_matches('/');

        let resp = http
            .get(format!("{root}/"))
            .basic_auth(&config.user, Some(&config.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| EceError::Graph(format!("Graph store unreachable at {root}: {e}")))?;
        if !resp.status().is_success() {
            return Err(EceError::Graph(format!(
                "Graph store at {root} answered {}",
                resp.status()
            )));
        }

        info!(uri = %root, database = %config.database, "Graph store connected");
        Ok(Self {
            http,
            commit_url: format!("{root}/db/{}/tx/commit", config.database),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl GraphStore for Neo4jHttpStore {
    async fn query(&self, cypher: &str, params: Option<Map<String, Value>>) -> EceResult<Value> {
        let body = serde_json::json!({
            "statements": [{
                "statement": cypher,
                "parameters": params.unwrap_or_default(),
            }]
        });

        let resp = self
            .http
            .post(&self.commit_url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EceError::Graph(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EceError::Graph(format!("Neo4j error {status}: {error_body}")));
        }

        let mut resp_body: Value = resp
            .json()
            .await
            .map_err(|e| EceError::Graph(e.to_string()))?;

        if let Some(first) = resp_body["errors"].as_array().and_then(|errors| errors.first()) {
            return Err(EceError::Graph(format!(
                "{}: {}",
                first["code"].as_str().unwrap_or("Neo.Unknown"),
                first["message"].as_str().unwrap_or("no message")
            )));
        }

        debug!(statement = %cypher, "Cypher committed");
        Ok(resp_body
            .get_mut("results")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

/// One statement seen by [`InMemoryGraphStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    /// Cypher text as issued.
    pub cypher: String,
    /// Bound parameters (empty when none).
    pub params: Map<String, Value>,
}

/// Graph store that records statements instead of executing them.
pub struct InMemoryGraphStore {
    queries: RwLock<Vec<RecordedQuery>>,
}

impl InMemoryGraphStore {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self {
            queries: RwLock::new(Vec::new()),
        }
    }

    /// Every statement received so far, oldest first.
    pub async fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.read().await.clone()
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn query(&self, cypher: &str, params: Option<Map<String, Value>>) -> EceResult<Value> {
        self.queries.write().await.push(RecordedQuery {
            cypher: cypher.to_string(),
            params: params.unwrap_or_default(),
        });
        Ok(Value::Array(Vec::new()))
    }
}
