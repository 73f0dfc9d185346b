//! Long-term memory for the engine.
//!
//! The working-memory document is the short-term context the orchestrator
//! distills; the [`Archivist`] moves its tail into a [`GraphStore`] as
//! `Memory` nodes.

/// Archivist: working memory to graph nodes.
pub mod archivist;
/// Graph store trait and backends.
pub mod graph;
/// Working-memory document readers.
pub mod working_memory;

pub use archivist::Archivist;
pub use graph::{GraphBackend, GraphConfig, GraphStore, InMemoryGraphStore, Neo4jHttpStore, RecordedQuery};
pub use working_memory::{read_file_content, read_last_n_chars};
