use async_trait::async_trait;
use ece_blackboard::Blackboard;
use ece_core::{EceError, EceResult, TaskPayload};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a worker does with one dequeued task.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Name posted as `source_agent` on every result message.
    fn identity(&self) -> &str;

    /// Queue this handler consumes from.
    fn queue_name(&self) -> &str;

    /// Process one task and return the text to post.
    async fn handle(&self, task: &TaskPayload) -> EceResult<String>;
}

/// Long-running consumer: dequeue, handle, post, repeat.
///
/// Per-task failures are posted to the log as failure-shaped messages and the
/// loop keeps going. A store failure ends [`AgentWorker::run`] with the error.
pub struct AgentWorker {
    blackboard: Blackboard,
    handler: Arc<dyn TaskHandler>,
    shutdown: CancellationToken,
}

impl AgentWorker {
    /// Worker for `handler` with its own shutdown token.
    pub fn new(blackboard: Blackboard, handler: Arc<dyn TaskHandler>) -> Self {
        Self::with_shutdown(blackboard, handler, CancellationToken::new())
    }

    /// Use an externally owned shutdown token, e.g. one shared by every worker
    /// in the process.
    pub fn with_shutdown(
        blackboard: Blackboard,
        handler: Arc<dyn TaskHandler>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            blackboard,
            handler,
            shutdown,
        }
    }

    /// Token that stops [`AgentWorker::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Handle one task and post its outcome. Returns whether the handler succeeded.
    pub async fn process_one(&self, task: &TaskPayload) -> EceResult<bool> {
        let identity = self.handler.identity();
        match self.handler.handle(task).await {
            Ok(content) => {
                self.blackboard.post_message(identity, content).await?;
                info!(agent = %identity, task_type = %task.task_type, "Task completed");
                Ok(true)
            }
            Err(e) => {
                error!(agent = %identity, task_type = %task.task_type, error = %e, "Task failed");
                self.blackboard
                    .post_message(identity, format!("Task '{}' failed: {e}", task.task_type))
                    .await?;
                Ok(false)
            }
        }
    }

    /// Consume tasks until shutdown. Returns the number of tasks processed.
    pub async fn run(&self) -> EceResult<usize> {
        let identity = self.handler.identity();
        let queue = self.handler.queue_name();
        info!(agent = %identity, queue = %queue, "Worker started");

        let mut processed = 0usize;
        loop {
            let task = match self
                .blackboard
                .dequeue_task_blocking(queue, &self.shutdown)
                .await
            {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(EceError::Json(e)) => {
                    // Already removed from the queue; report it and move on.
                    warn!(agent = %identity, queue = %queue, error = %e, "Malformed task dropped");
                    self.blackboard
                        .post_message(identity, format!("Task '<malformed>' failed: {e}"))
                        .await?;
                    processed += 1;
                    continue;
                }
                Err(e) => {
                    error!(agent = %identity, queue = %queue, error = %e, "Worker lost its store");
                    return Err(e);
                }
            };

            self.process_one(&task).await?;
            processed += 1;
        }

        info!(agent = %identity, processed, "Worker stopped");
        Ok(processed)
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<EceResult<usize>> {
        tokio::spawn(async move { self.run().await })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl TaskHandler for Upper {
        fn identity(&self) -> &str {
            "UpperAgent"
        }

        fn queue_name(&self) -> &str {
            "upper_tasks"
        }

        async fn handle(&self, task: &TaskPayload) -> EceResult<String> {
            task.str_field("text")
                .map(str::to_uppercase)
                .ok_or_else(|| EceError::Agent("missing 'text'".into()))
        }
    }

    #[tokio::test]
    async fn test_process_one_posts_result() {
        let bb = Blackboard::in_memory();
        let worker = AgentWorker::new(bb.clone(), Arc::new(Upper));

        let ok = worker
            .process_one(&TaskPayload::new("upper").with_field("text", "abc"))
            .await
            .unwrap();
        assert!(ok);

        let latest = bb.read_latest_messages(1).await.unwrap();
        assert_eq!(latest[0].source_agent, "UpperAgent");
        assert_eq!(latest[0].content, "ABC");
    }

    #[tokio::test]
    async fn test_process_one_posts_failure_shape() {
        let bb = Blackboard::in_memory();
        let worker = AgentWorker::new(bb.clone(), Arc::new(Upper));

        let ok = worker.process_one(&TaskPayload::new("upper")).await.unwrap();
        assert!(!ok);

        let latest = bb.read_latest_messages(1).await.unwrap();
        assert_eq!(
            latest[0].content,
            "Task 'upper' failed: Agent error: missing 'text'"
        );
    }

    #[tokio::test]
    async fn test_run_returns_zero_when_already_cancelled() {
        let worker = AgentWorker::new(Blackboard::in_memory(), Arc::new(Upper));
        worker.shutdown_token().cancel();
        assert_eq!(worker.run().await.unwrap(), 0);
    }
}
