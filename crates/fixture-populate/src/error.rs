//! Error types for fixture population.

use crate::store::StoreError;
use fixture_generator::{DefinitionError, GenerationError};
use thiserror::Error;

/// Errors that can occur while populating a fixture table.
#[derive(Error, Debug)]
pub enum PopulateError {
    /// A row could not be generated; the table was dropped.
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// A batch insert failed; surfaced after every sibling batch finished.
    #[error("Insert error: table '{table}', batch {batch} (first row {first_index}): {source}")]
    Insert {
        table: String,
        batch: u64,
        first_index: u64,
        #[source]
        source: StoreError,
    },

    /// Any other store failure (control table, DDL).
    #[error("Store error: table '{table}': {source}")]
    Store {
        table: String,
        #[source]
        source: StoreError,
    },

    /// A population task panicked or was cancelled.
    #[error("Task error: table '{table}': {message}")]
    Task { table: String, message: String },

    /// Unknown table or invalid definition.
    #[error("Definition error: {0}")]
    Definition(#[from] DefinitionError),
}

impl PopulateError {
    /// Table the error belongs to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Generation(e) => Some(&e.table),
            Self::Insert { table, .. } | Self::Store { table, .. } | Self::Task { table, .. } => {
                Some(table)
            }
            Self::Definition(_) => None,
        }
    }

    pub(crate) fn store(table: &str, source: StoreError) -> Self {
        Self::Store {
            table: table.to_string(),
            source,
        }
    }
}
