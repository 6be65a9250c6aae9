//! Deterministic row generation for parity fixture tables.
//!
//! This crate turns declarative table definitions into rows:
//!
//! - [`TableRegistry`] - Ordered, explicitly owned set of [`TableDefinition`]s
//! - [`RowGenerator`] / [`RowStream`] - Default values, mutations and coercion for row `index`
//! - [`MutationSet`] - Per-column overrides, declarative or custom
//! - [`Signature`] - Fingerprint of a table's generation contract
//! - [`catalog`] - The built-in parity tables
//!
//! # Determinism
//!
//! Every value is a pure function of the definition and the row index.
//! Seeded generators derive a fresh RNG per row from the table seed, so a
//! row never depends on the rows generated before it.
//!
//! # Example
//!
//! ```
//! use fixture_core::MutationSpec;
//! use fixture_generator::{RowStream, TableDefinition, TableRegistry};
//!
//! let mut registry = TableRegistry::new();
//! let table = registry
//!     .register(
//!         TableDefinition::builder("fails_column_value")
//!             .row_count(3)
//!             .mutate("value", MutationSpec::Multiply { factor: 2 }),
//!     )
//!     .unwrap();
//!
//! let values: Vec<i64> = RowStream::new(table)
//!     .map(|row| row.unwrap().get("value").and_then(|v| v.as_i64()).unwrap())
//!     .collect();
//! assert_eq!(values, vec![20, 40, 60]);
//! ```

pub mod catalog;
pub mod definition;
pub mod generator;
pub mod generators;
pub mod mutation;
pub mod registry;
pub mod signature;

pub use catalog::{parity_columns, parity_registry};
pub use definition::{DefinitionError, TableDefinition, TableDefinitionBuilder};
pub use generator::{GenerationError, RowError, RowGenerator, RowStream};
pub use mutation::{
    apply_mutations, CustomMutation, MutationError, MutationFailure, MutationRule, MutationSet,
};
pub use registry::TableRegistry;
pub use signature::{compute_signature, Signature};
