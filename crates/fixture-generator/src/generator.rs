//! Row generation.
//!
//! [`RowGenerator`] produces one row for a given index; [`RowStream`] walks
//! `0..row_count` lazily so that only one batch worth of rows is ever held
//! by the loader.

use crate::definition::TableDefinition;
use crate::generators::generate_default;
use crate::mutation::{apply_mutations, MutationError};
use fixture_core::{FixtureValue, GeneratedRow, ValueError};
use std::collections::HashMap;
use std::sync::Arc;

/// Why a single column of a row could not be produced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("null value in a non-nullable column")]
    NullViolation,
}

/// A row could not be generated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("table '{table}', row {index}, column '{column}': {source}")]
pub struct GenerationError {
    pub table: String,
    pub index: u64,
    pub column: String,
    #[source]
    pub source: RowError,
}

/// Generates rows for one table definition.
pub struct RowGenerator<'a> {
    definition: &'a TableDefinition,
}

impl<'a> RowGenerator<'a> {
    pub fn new(definition: &'a TableDefinition) -> Self {
        Self { definition }
    }

    /// Default values for row `index`, before mutations.
    ///
    /// Never fails: defaults are validated when the definition is built.
    pub fn generate(&self, index: u64) -> GeneratedRow {
        let seed = self.definition.seed();
        let fields: HashMap<_, _> = self
            .definition
            .columns()
            .iter()
            .map(|column| {
                (
                    column.name.clone(),
                    generate_default(&column.default, seed, index),
                )
            })
            .collect();
        GeneratedRow::new(index, fields)
    }

    /// Final row `index`: defaults, then mutations, then type coercion.
    pub fn generate_mutated(&self, index: u64) -> Result<GeneratedRow, GenerationError> {
        let table = self.definition.name();
        let defaults = self.generate(index);
        let mut row = apply_mutations(index, defaults, self.definition.mutations()).map_err(
            |failure| GenerationError {
                table: table.to_string(),
                index,
                column: failure.column,
                source: failure.source.into(),
            },
        )?;

        for column in self.definition.columns() {
            let fail = |source: RowError| GenerationError {
                table: table.to_string(),
                index,
                column: column.name.clone(),
                source,
            };
            let value = row.fields.remove(&column.name).unwrap_or(FixtureValue::Null);
            if value.is_null() && !column.nullable {
                return Err(fail(RowError::NullViolation));
            }
            let value = value
                .coerce_to(&column.column_type)
                .map_err(|e| fail(e.into()))?;
            row.fields.insert(column.name.clone(), value);
        }

        Ok(row)
    }
}

/// Lazy iterator over the final rows of a table, in index order.
///
/// The stream ends after the first error.
pub struct RowStream {
    definition: Arc<TableDefinition>,
    next: u64,
    end: u64,
    failed: bool,
}

impl RowStream {
    /// Stream over all `row_count` rows of `definition`.
    pub fn new(definition: Arc<TableDefinition>) -> Self {
        let end = definition.row_count();
        Self::range(definition, 0, end)
    }

    /// Stream over rows `start..end`.
    pub fn range(definition: Arc<TableDefinition>, start: u64, end: u64) -> Self {
        Self {
            definition,
            next: start,
            end,
            failed: false,
        }
    }

    pub fn definition(&self) -> &Arc<TableDefinition> {
        &self.definition
    }
}

impl Iterator for RowStream {
    type Item = Result<GeneratedRow, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let row = RowGenerator::new(&self.definition).generate_mutated(index);
        if row.is_err() {
            self.failed = true;
        }
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = usize::try_from(self.end.saturating_sub(self.next)).unwrap_or(usize::MAX);
        (0, Some(remaining))
    }
}

impl std::iter::FusedIterator for RowStream {}
