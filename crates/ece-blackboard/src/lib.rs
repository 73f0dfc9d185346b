//! Shared blackboard: an append-only message log plus named FIFO task queues.
//!
//! Agents never talk to each other directly. They post messages to the log and
//! tasks to named queues, and they block on the queue they serve. Everything
//! goes through the atomic primitives of a [`ListStore`], so no additional
//! locking is needed on top of it.
//!
//! # Main types
//!
//! - [`Blackboard`]: Message log and task queue operations.
//! - [`ListStore`]: Trait for the backing list store (Redis-like primitives).
//! - [`InMemoryListStore`]: Process-local store with blocking pops.
//! - [`FileListStore`]: JSONL-backed store shared across processes and restarts.
//! - [`BlackboardConfig`]: Log key and backend selection.

/// Blackboard operations on top of a list store.
pub mod blackboard;
/// Blackboard configuration and store construction.
pub mod config;
/// List store trait and implementations.
pub mod store;

pub use blackboard::Blackboard;
pub use config::{BlackboardConfig, StoreBackend};
pub use store::{FileListStore, InMemoryListStore, ListStore};
