//! Core types for the parity-fixtures population engine.
//!
//! This crate provides the foundational, behaviour-free types:
//!
//! - [`ColumnType`] - Declared column types and the [`ToDdl`] seam for stores
//! - [`FixtureValue`] - Raw column values and their coercion rules
//! - [`GeneratedRow`] - One transient generated row
//! - [`DefaultGenerator`] / [`MutationSpec`] - Declarative generation rules
//! - [`FixtureSchema`] - Definitions loaded from YAML
//!
//! # Architecture
//!
//! ```text
//! fixture-core (this crate)
//!    │
//!    ├─── fixture-generator  (rows, mutations, signatures, registry)
//!    │
//!    └─── fixture-populate   (cache gate, batch loader, orchestrator, stores)
//! ```

pub mod schema;
pub mod types;
pub mod values;

// Re-exports for convenience
pub use schema::{
    ColumnDefinition, DefaultGenerator, FixtureSchema, MutationDecl, MutationSpec, SchemaError,
    TableSpec, DEFAULT_ROW_COUNT, ROW_COUNT_KEY,
};
pub use types::{ColumnType, ToDdl};
pub use values::{parse_datetime, FixtureValue, GeneratedRow, GeneratedRowBuilder, ValueError};
