use thiserror::Error;

/// A convenience `Result` alias using [`EceError`].
pub type EceResult<T> = Result<T, EceError>;

/// Top-level error type for the coordination substrate.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum EceError {
    /// The backing list store is unreachable or rejected an operation.
    #[error("Store error: {0}")]
    Store(String),

    /// The persistent graph store is unreachable or rejected a query.
    #[error("Graph error: {0}")]
    Graph(String),

    /// An outbound HTTP request failed (inference, scrape, search).
    #[error("HTTP error: {0}")]
    Http(String),

    /// A worker agent could not process a task.
    #[error("Agent error: {0}")]
    Agent(String),

    /// A crew fan-out or synthesis step failed.
    #[error("Crew error: {0}")]
    Crew(String),

    /// The orchestration loop hit an error.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The single-instance lock is held by another process.
    #[error("Lock error: {0}")]
    Lock(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
