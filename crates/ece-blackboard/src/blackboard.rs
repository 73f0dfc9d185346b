use crate::config::BlackboardConfig;
use crate::store::{InMemoryListStore, ListStore};
use ece_core::{BlackboardMessage, EceError, EceResult, TaskPayload};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shared message log plus named FIFO task queues.
///
/// Cheap to clone; every clone talks to the same store. Messages are appended
/// to the tail of the log list; tasks are pushed to the tail of their queue and
/// popped from the head, so a single producer's tasks are consumed in order.
#[derive(Clone)]
pub struct Blackboard {
    store: Arc<dyn ListStore>,
    stream_key: String,
}

impl Blackboard {
    /// Connect to a store, failing if it is unreachable.
    ///
    /// There is no retry: an unreachable store is fatal for the caller.
    pub async fn connect(store: Arc<dyn ListStore>, config: &BlackboardConfig) -> EceResult<Self> {
        store.ping().await.map_err(|e| match e {
            EceError::Store(msg) => EceError::Store(format!("Blackboard store unreachable: {msg}")),
            other => other,
        })?;
        info!(stream = %config.stream_key, "Blackboard connected");
        Ok(Self {
            store,
            stream_key: config.stream_key.clone(),
        })
    }

    /// Open the store described by `config` and connect to it.
    pub async fn open(config: &BlackboardConfig) -> EceResult<Self> {
        let store = config.open_store().await?;
        Self::connect(store, config).await
    }

    /// A blackboard on a fresh process-local store.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryListStore::new()),
            stream_key: BlackboardConfig::default().stream_key,
        }
    }

    /// List key of the message log.
    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// Append a message to the shared log.
    pub async fn post_message(
        &self,
        source_agent: impl Into<String>,
        content: impl Into<String>,
    ) -> EceResult<()> {
        let message = BlackboardMessage::new(source_agent, content);
        let wire = serde_json::to_string(&message)?;
        let len = self.store.rpush(&self.stream_key, wire).await?;
        debug!(source = %message.source_agent, log_len = len, "Message posted");
        Ok(())
    }

    /// The most recent `n` messages, oldest first.
    ///
    /// Returns fewer than `n` when the log is shorter, and nothing for `n == 0`.
    pub async fn read_latest_messages(&self, n: usize) -> EceResult<Vec<BlackboardMessage>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let start = -i64::try_from(n).unwrap_or(i64::MAX);
        self.store
            .lrange(&self.stream_key, start, -1)
            .await?
            .iter()
            .map(|raw| serde_json::from_str(raw).map_err(EceError::from))
            .collect()
    }

    /// Number of messages in the log.
    pub async fn message_count(&self) -> EceResult<usize> {
        self.store.llen(&self.stream_key).await
    }

    /// Drop the whole message log. Administrative; not part of normal flow.
    pub async fn clear_messages(&self) -> EceResult<bool> {
        let existed = self.store.delete(&self.stream_key).await?;
        info!(stream = %self.stream_key, "Message log cleared");
        Ok(existed)
    }

    /// Enqueue a task on the tail of `queue_name`, creating the queue if needed.
    pub async fn post_task(&self, queue_name: &str, payload: &TaskPayload) -> EceResult<()> {
        let wire = serde_json::to_string(payload)?;
        let len = self.store.rpush(queue_name, wire).await?;
        debug!(queue = %queue_name, task_type = %payload.task_type, queue_len = len, "Task posted");
        Ok(())
    }

    /// Wait for the next task on `queue_name` and take it.
    ///
    /// No timeout. Returns `Ok(None)` once `shutdown` is cancelled. A task that
    /// fails to decode has already been removed from the queue; the error is
    /// returned to the caller and the task is not re-enqueued.
    pub async fn dequeue_task_blocking(
        &self,
        queue_name: &str,
        shutdown: &CancellationToken,
    ) -> EceResult<Option<TaskPayload>> {
        match self.store.blpop(queue_name, shutdown).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Take the next task on `queue_name` without waiting.
    pub async fn try_dequeue_task(&self, queue_name: &str) -> EceResult<Option<TaskPayload>> {
        match self.store.lpop(queue_name).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Number of tasks waiting on `queue_name`.
    pub async fn queue_len(&self, queue_name: &str) -> EceResult<usize> {
        self.store.llen(queue_name).await
    }
}
