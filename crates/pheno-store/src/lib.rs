//! Canonical event persistence.
//!
//! [`EventStore`] is the seam the extractor writes through. The SQLite
//! backend compiles [`pheno_model::Predicate`] filters to bound parameters;
//! the in-memory backend evaluates them directly.

pub mod error;
pub mod memory;
pub mod schema;
pub mod sql;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryEventStore;
pub use schema::{EVENTS_TABLE, EventColumn, SCHEMA_PHENOTYPES, install_schema};
pub use sqlite::{DEFAULT_CHUNK_SIZE, SqliteEventStore};
pub use store::{CommitBatch, CommitReport, EventStore};
