//! Signature-gated population of parity fixture tables.
//!
//! A [`TableOrchestrator`] walks the tables of a
//! [`fixture_generator::TableRegistry`]. For each table the [`CacheGate`]
//! compares the table's current signature with the one recorded in the
//! control table; only tables whose signature changed are dropped,
//! recreated and refilled by the [`BatchLoader`].
//!
//! Stores implement [`FixtureStore`]: [`PostgreSQLStore`] for real
//! databases and [`MemoryStore`] for dry runs and tests.

pub mod args;
pub mod config;
pub mod error;
pub mod gate;
pub mod loader;
pub mod memory;
pub mod metrics;
pub mod orchestrator;
pub mod postgresql;
pub mod store;

pub use args::{DefinitionArgs, PopulateArgs};
pub use config::{PopulateSettings, DEFAULT_BATCH_SIZE};
pub use error::PopulateError;
pub use gate::{CacheGate, GateDecision};
pub use loader::BatchLoader;
pub use memory::{MemoryStore, StoreOp};
pub use metrics::PopulateMetrics;
pub use orchestrator::{PopulateOutcome, PopulationReport, TableOrchestrator, TableReport};
pub use postgresql::PostgreSQLStore;
pub use store::{CacheRecord, FixtureStore, StoreError, CACHE_TABLE};
