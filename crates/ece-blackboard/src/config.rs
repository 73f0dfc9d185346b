use crate::store::{FileListStore, InMemoryListStore, ListStore};
use ece_core::EceResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which backing store the blackboard runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local lists; everything is lost on exit.
    Memory,
    /// JSONL files under `data_dir`, shared by every process using the directory.
    #[default]
    File,
}

/// Blackboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardConfig {
    /// List key of the shared message log.
    #[serde(default = "default_stream_key")]
    pub stream_key: String,
    /// Store implementation.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Directory for the file backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// How often a blocked dequeue on the file backend re-reads the queue.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_stream_key() -> String {
    "blackboard_stream".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/blackboard")
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for BlackboardConfig {
    fn default() -> Self {
        Self {
            stream_key: default_stream_key(),
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl BlackboardConfig {
    /// Build the configured store.
    pub async fn open_store(&self) -> EceResult<Arc<dyn ListStore>> {
        Ok(match self.backend {
            StoreBackend::Memory => Arc::new(InMemoryListStore::new()),
            StoreBackend::File => Arc::new(
                FileListStore::open(&self.data_dir)
                    .await?
                    .with_poll_interval(Duration::from_millis(self.poll_interval_ms)),
            ),
        })
    }
}
