//! Core types and error definitions shared by every ECE crate.
//!
//! # Main types
//!
//! - [`EceError`]: Unified error enum for all ECE subsystems.
//! - [`EceResult`]: Convenience alias for `Result<T, EceError>`.
//! - [`BlackboardMessage`]: One entry of the shared message log.
//! - [`TaskPayload`]: A task posted to a named queue.

/// Error enum and result alias.
pub mod error;
/// Wire types exchanged through the blackboard.
pub mod message;

pub use error::{EceError, EceResult};
pub use message::{BlackboardMessage, TaskPayload};
