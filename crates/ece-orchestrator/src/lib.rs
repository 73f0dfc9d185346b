//! Orchestration for the engine: the periodic cycle, the crew fan-out used
//! for distillation, and the single-instance lock.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Fixed-interval read, distill, archive loop.
//! - [`Crew`]: Concurrent analysts joined before one synthesis call.
//! - [`Distiller`]: The default three-analyst crew posting to the blackboard.
//! - [`InstanceLock`]: Keeps a second orchestrator off the same data directory.

/// Crew fan-out / fan-in.
pub mod crew;
/// Distillation crew wired to the blackboard.
pub mod distiller;
/// Orchestrator cycle and lifecycle.
pub mod engine;
/// Single-instance lock file.
pub mod lock;

pub use crew::{Analyst, Crew, CrewConfig, CrewFailurePolicy, CrewOutput, CrewStatus};
pub use distiller::{Distiller, DISTILLER_AGENT};
pub use engine::{ArchiveStep, CycleOutcome, DistillStep, Orchestrator, OrchestratorConfig};
pub use lock::{InstanceLock, LOCK_FILE_NAME};
