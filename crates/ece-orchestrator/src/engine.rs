use crate::distiller::Distiller;
use async_trait::async_trait;
use chrono::Utc;
use ece_core::{EceError, EceResult};
use ece_memory::{read_file_content, Archivist};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Step 2 of a cycle: condense the working-memory snapshot.
#[async_trait]
pub trait DistillStep: Send + Sync {
    /// Condense `snapshot`.
    async fn distill(&self, snapshot: &str) -> EceResult<()>;
}

/// Step 3 of a cycle: move the tail of working memory into long-term storage.
#[async_trait]
pub trait ArchiveStep: Send + Sync {
    /// Archive the last `chunk_size` characters of `working_memory_path`.
    async fn archive(&self, working_memory_path: &Path, chunk_size: usize) -> EceResult<()>;
}

#[async_trait]
impl DistillStep for Distiller {
    async fn distill(&self, snapshot: &str) -> EceResult<()> {
        Distiller::distill(self, snapshot).await.map(|_| ())
    }
}

#[async_trait]
impl ArchiveStep for Archivist {
    async fn archive(&self, working_memory_path: &Path, chunk_size: usize) -> EceResult<()> {
        self.archive_from_working_memory(working_memory_path, chunk_size)
            .await
            .map(|_| ())
    }
}

/// `[orchestrator]` section of the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between cycle starts.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// Document read at the start of each cycle.
    #[serde(default = "default_working_memory_path")]
    pub working_memory_path: PathBuf,
    /// Characters handed to the archive step each cycle.
    #[serde(default = "default_archive_chunk_size")]
    pub archive_chunk_size: usize,
}

fn default_cycle_interval_secs() -> u64 {
    600
}

fn default_working_memory_path() -> PathBuf {
    PathBuf::from("main_context.md")
}

fn default_archive_chunk_size() -> usize {
    4000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            working_memory_path: default_working_memory_path(),
            archive_chunk_size: default_archive_chunk_size(),
        }
    }
}

impl OrchestratorConfig {
    /// The configured wait between cycles.
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }
}

/// How one cycle body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Working memory was empty or unreadable; no step ran.
    Skipped,
    /// Both steps ran and succeeded.
    Completed,
    /// A step failed; the loop carries on with the next cycle.
    Failed {
        /// Which step failed and why.
        reason: String,
    },
}

struct Inner {
    config: OrchestratorConfig,
    interval: Duration,
    distill: Arc<dyn DistillStep>,
    archive: Arc<dyn ArchiveStep>,
    cycles: AtomicU64,
}

impl Inner {
    async fn run_cycle(&self) -> CycleOutcome {
        info!(at = %Utc::now().to_rfc3339(), "Orchestrator: starting new cycle");
        let outcome = self.cycle_body().await;
        self.cycles.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn cycle_body(&self) -> CycleOutcome {
        let path = &self.config.working_memory_path;
        let snapshot = read_file_content(path).await;
        if snapshot.is_empty() {
            info!(path = %path.display(), "Orchestrator: working memory is empty, nothing to process");
            return CycleOutcome::Skipped;
        }

        if let Err(e) = self.distill.distill(&snapshot).await {
            error!(error = %e, "Orchestrator: distillation failed");
            return CycleOutcome::Failed {
                reason: format!("distillation failed: {e}"),
            };
        }
        info!("Orchestrator: distillation complete");

        if let Err(e) = self
            .archive
            .archive(path, self.config.archive_chunk_size)
            .await
        {
            error!(error = %e, "Orchestrator: archiving failed");
            return CycleOutcome::Failed {
                reason: format!("archiving failed: {e}"),
            };
        }
        info!("Orchestrator: archiving complete");

        CycleOutcome::Completed
    }

    async fn run_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = self.interval;
        while !shutdown.is_cancelled() {
            self.run_cycle().await;
            info!(wait_ms = interval.as_millis() as u64, "Orchestrator: cycle complete, waiting");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("Orchestrator: loop exited");
    }
}

#[derive(Default)]
struct CycleState {
    running: bool,
    handle: Option<JoinHandle<()>>,
    shutdown: Option<CancellationToken>,
}

/// Periodic driver of the distill and archive steps.
///
/// At most one cycle loop runs per instance. `stop()` cancels the interval
/// wait at once; a cycle already in flight finishes first, and a loop started
/// meanwhile begins only after it.
pub struct Orchestrator {
    inner: Arc<Inner>,
    state: Mutex<CycleState>,
}

impl Orchestrator {
    /// Orchestrator driving `distill` and `archive` per `config`. Not started.
    pub fn new(
        config: OrchestratorConfig,
        distill: Arc<dyn DistillStep>,
        archive: Arc<dyn ArchiveStep>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval: config.cycle_interval(),
                config,
                distill,
                archive,
                cycles: AtomicU64::new(0),
            }),
            state: Mutex::new(CycleState::default()),
        }
    }

    /// Override the wait between cycles with sub-second precision.
    ///
    /// Only takes effect before the first `start()`.
    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.interval = interval;
        }
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Whether a loop has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Number of cycle bodies executed so far, whatever their outcome.
    pub fn cycles_run(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    /// Spawn the background loop. Returns `false` if it is already running.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.running {
            info!("Orchestrator: the loop is already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let inner = self.inner.clone();
        let previous = state.handle.take().filter(|handle| !handle.is_finished());
        if previous.is_some() {
            warn!("Orchestrator: previous loop still finishing its last cycle, new loop will wait");
        }
        let loop_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            // The stopped loop keeps its in-flight cycle; never overlap it.
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    error!(error = %e, "Orchestrator: previous loop ended abnormally");
                }
            }
            inner.run_loop(loop_shutdown).await;
        });
        state.handle = Some(handle);
        state.shutdown = Some(shutdown);
        state.running = true;
        info!(
            interval_ms = self.inner.interval.as_millis() as u64,
            "Orchestrator: background loop started"
        );
        true
    }

    /// Signal the loop to exit. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        if !state.running {
            info!("Orchestrator: the loop is not currently running");
            return false;
        }
        state.running = false;
        if let Some(shutdown) = state.shutdown.take() {
            shutdown.cancel();
        }
        info!("Orchestrator: stop requested");
        true
    }

    /// Wait for the background loop to exit. Returns immediately if none was started.
    pub async fn join(&self) -> EceResult<()> {
        let handle = self.state.lock().handle.take();
        if let Some(handle) = handle {
            handle.await.map_err(|e| {
                error!(error = %e, "Orchestrator: loop task ended abnormally");
                EceError::Orchestrator(format!("cycle loop ended abnormally: {e}"))
            })?;
        }
        Ok(())
    }

    /// Run one cycle body on the caller's task, outside the loop.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.inner.run_cycle().await
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(shutdown) = self.state.get_mut().shutdown.take() {
            shutdown.cancel();
        }
    }
}
