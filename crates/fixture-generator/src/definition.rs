//! Table definitions and their builder.
//!
//! A [`TableDefinition`] is immutable once built. Building validates every
//! default generator and declarative mutation against the column types, so
//! row generation never has to check them again.

use crate::catalog::parity_columns;
use crate::generators::offset_timestamp;
use crate::generators::pattern::expand_pattern;
use crate::mutation::{MutationRule, MutationSet};
use crate::signature::{compute_signature, Signature};
use fixture_core::{
    ColumnDefinition, ColumnType, DefaultGenerator, FixtureValue, MutationSpec, SchemaError,
    TableSpec, ROW_COUNT_KEY,
};
use std::collections::HashSet;

/// Longest table name accepted (PostgreSQL identifier limit).
pub const MAX_TABLE_NAME_LEN: usize = 63;

/// Error raised while building or registering table definitions.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("table '{0}' is already registered")]
    DuplicateTable(String),

    #[error("invalid table name '{0}'")]
    InvalidName(String),

    #[error("table '{0}' has no columns")]
    EmptyTable(String),

    #[error("table '{table}' declares column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("table '{table}' has a mutation for unknown column '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("table '{table}' has an invalid row count: {reason}")]
    InvalidRowCount { table: String, reason: String },

    #[error("column '{table}.{column}' has an invalid default: {reason}")]
    InvalidDefault {
        table: String,
        column: String,
        reason: String,
    },

    #[error("column '{table}.{column}' has an invalid mutation: {reason}")]
    InvalidMutation {
        table: String,
        column: String,
        reason: String,
    },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Immutable description of one fixture table.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    name: String,
    position: usize,
    columns: Vec<ColumnDefinition>,
    row_count: u64,
    seed: u64,
    mutations: MutationSet,
    signature: Signature,
}

impl TableDefinition {
    /// Start building a definition.
    pub fn builder(name: impl Into<String>) -> TableDefinitionBuilder {
        TableDefinitionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordinal position in the registry that owns this definition.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of rows a population must insert.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Seed for the seeded default generators.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn mutations(&self) -> &MutationSet {
        &self.mutations
    }

    /// Fingerprint of this definition's generation contract.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Builder for [`TableDefinition`].
///
/// Tables built without explicit columns get the parity column template.
#[derive(Debug, Clone)]
pub struct TableDefinitionBuilder {
    name: String,
    columns: Option<Vec<ColumnDefinition>>,
    row_count: Option<u64>,
    seed: u64,
    mutations: Vec<(String, MutationRule)>,
}

impl TableDefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: None,
            row_count: None,
            seed: 0,
            mutations: Vec::new(),
        }
    }

    /// Builder from one entry of a definitions file.
    pub fn from_spec(spec: TableSpec) -> Self {
        let mut builder = Self::new(spec.name);
        builder.columns = spec.columns;
        builder.row_count = spec.row_count;
        builder.seed = spec.seed.unwrap_or(0);
        for (column, decl) in spec.mutations {
            builder = builder.mutate(column, decl.into_spec());
        }
        builder
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append one column.
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.get_or_insert_with(Vec::new).push(column);
        self
    }

    /// Replace the column list.
    pub fn columns(mut self, columns: Vec<ColumnDefinition>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Set the target row count.
    pub fn row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    /// Set the seed for seeded default generators.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Override the values of `column`.
    ///
    /// The reserved `row_count` key sets the target row count instead and
    /// must be given a non-negative integer literal.
    pub fn mutate(mut self, column: impl Into<String>, rule: impl Into<MutationRule>) -> Self {
        self.mutations.push((column.into(), rule.into()));
        self
    }

    /// Validate and freeze the definition.
    pub(crate) fn build(
        self,
        position: usize,
        default_row_count: u64,
    ) -> Result<TableDefinition, DefinitionError> {
        let name = self.name;
        if name.is_empty() || name.len() > MAX_TABLE_NAME_LEN || name.contains('\0') {
            return Err(DefinitionError::InvalidName(name));
        }

        let columns = self.columns.unwrap_or_else(parity_columns);
        if columns.is_empty() {
            return Err(DefinitionError::EmptyTable(name));
        }
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DefinitionError::DuplicateColumn {
                    table: name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        let mut row_count = self.row_count.unwrap_or(default_row_count);
        let mut mutations = MutationSet::new();
        for (column, rule) in self.mutations {
            if column == ROW_COUNT_KEY {
                row_count = row_count_override(&name, &rule)?;
                continue;
            }
            let Some(definition) = columns.iter().find(|c| c.name == column) else {
                return Err(DefinitionError::UnknownColumn {
                    table: name,
                    column,
                });
            };
            validate_mutation(definition, &rule).map_err(|reason| {
                DefinitionError::InvalidMutation {
                    table: name.clone(),
                    column: column.clone(),
                    reason,
                }
            })?;
            mutations.insert(column, rule);
        }

        for column in &columns {
            validate_default(column, row_count).map_err(|reason| DefinitionError::InvalidDefault {
                table: name.clone(),
                column: column.name.clone(),
                reason,
            })?;
        }

        let mut definition = TableDefinition {
            name,
            position,
            columns,
            row_count,
            seed: self.seed,
            mutations,
            signature: Signature::default(),
        };
        definition.signature = compute_signature(&definition);
        Ok(definition)
    }
}

fn row_count_override(table: &str, rule: &MutationRule) -> Result<u64, DefinitionError> {
    let invalid = |reason: String| DefinitionError::InvalidRowCount {
        table: table.to_string(),
        reason,
    };
    match rule {
        MutationRule::Declared(MutationSpec::Literal { value }) => match value.as_i64() {
            Some(count) => u64::try_from(count).map_err(|_| invalid(format!("{count} is negative"))),
            None => Err(invalid(format!("expected an integer, found {}", value.kind()))),
        },
        _ => Err(invalid("must be an integer literal".to_string())),
    }
}

/// Check that `value` can be stored in `column`.
fn check_value(column: &ColumnDefinition, value: &FixtureValue) -> Result<(), String> {
    if value.is_null() {
        return if column.nullable {
            Ok(())
        } else {
            Err("null in a non-nullable column".to_string())
        };
    }
    value
        .clone()
        .coerce_to(&column.column_type)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn check_integer_fits(column_type: &ColumnType, value: i64) -> Result<(), String> {
    match column_type {
        ColumnType::Int32 if i32::try_from(value).is_err() => {
            Err(format!("{value} is out of range for {column_type}"))
        }
        ColumnType::Int32 | ColumnType::Int64 | ColumnType::Float64 => Ok(()),
        other => Err(format!("integer values do not fit {other}")),
    }
}

fn validate_default(column: &ColumnDefinition, row_count: u64) -> Result<(), String> {
    let last_index = row_count.saturating_sub(1);
    let last = i64::try_from(last_index).map_err(|_| "row count too large".to_string())?;

    match &column.default {
        DefaultGenerator::Sequential { start, step } => {
            let end = step
                .checked_mul(last)
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| "sequence overflows".to_string())?;
            check_integer_fits(&column.column_type, *start)?;
            check_integer_fits(&column.column_type, end)
        }

        DefaultGenerator::Alternating { even, odd } => {
            check_value(column, even)?;
            check_value(column, odd)
        }

        DefaultGenerator::Static { value } => check_value(column, value),

        DefaultGenerator::Pattern { pattern } => {
            if !column.column_type.is_string() {
                return Err(format!("pattern cannot produce {}", column.column_type));
            }
            // Expansions only grow with the index.
            check_value(column, &FixtureValue::String(expand_pattern(pattern, 0, None)))?;
            check_value(
                column,
                &FixtureValue::String(expand_pattern(pattern, last_index, None)),
            )
        }

        DefaultGenerator::Timestamp {
            start,
            step_seconds,
        } => {
            if column.column_type != ColumnType::LocalDateTime {
                return Err(format!("timestamp cannot produce {}", column.column_type));
            }
            offset_timestamp(*start, *step_seconds, last_index)
                .map(|_| ())
                .ok_or_else(|| "timestamp overflows".to_string())
        }

        DefaultGenerator::OneOf { values } => {
            if values.is_empty() {
                return Err("one_of has no values".to_string());
            }
            values.iter().try_for_each(|v| check_value(column, v))
        }

        DefaultGenerator::IntRange { min, max } => {
            if min > max {
                return Err(format!("min {min} is greater than max {max}"));
            }
            check_integer_fits(&column.column_type, *min)?;
            check_integer_fits(&column.column_type, *max)
        }

        DefaultGenerator::Null => check_value(column, &FixtureValue::Null),
    }
}

fn validate_mutation(column: &ColumnDefinition, rule: &MutationRule) -> Result<(), String> {
    let MutationRule::Declared(spec) = rule else {
        return Ok(());
    };
    let column_type = &column.column_type;

    match spec {
        MutationSpec::Literal { value } => check_value(column, value),

        MutationSpec::Pattern { .. } | MutationSpec::Lowercase | MutationSpec::Uppercase => {
            if column_type.is_string() {
                Ok(())
            } else {
                Err(format!("string rule on a {column_type} column"))
            }
        }

        MutationSpec::Add { .. } | MutationSpec::Multiply { .. } => {
            if column_type.is_numeric() {
                Ok(())
            } else {
                Err(format!("arithmetic rule on a {column_type} column"))
            }
        }

        MutationSpec::Cycle { values } => {
            if values.is_empty() {
                return Err("cycle has no values".to_string());
            }
            values.iter().try_for_each(|v| check_value(column, v))
        }

        MutationSpec::EveryNth {
            n,
            value,
            otherwise,
        } => {
            if *n == 0 {
                return Err("every_nth period must be positive".to_string());
            }
            check_value(column, value)?;
            check_value(column, otherwise)
        }

        MutationSpec::ShiftTime { .. } => {
            if *column_type == ColumnType::LocalDateTime {
                Ok(())
            } else {
                Err(format!("shift_time on a {column_type} column"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(builder: TableDefinitionBuilder) -> Result<TableDefinition, DefinitionError> {
        builder.build(0, 50)
    }

    #[test]
    fn test_parity_template_by_default() {
        let def = build(TableDefinition::builder("test_table")).unwrap();
        assert_eq!(def.row_count(), 50);
        assert_eq!(def.columns().len(), 10);
        assert_eq!(def.column_names()[0], "id");
        assert!(def.mutations().is_empty());
        assert_eq!(def.signature().as_str().len(), 32);
    }

    #[test]
    fn test_row_count_key() {
        let def = build(TableDefinition::builder("fails_row_count").mutate("row_count", MutationRule::literal(6)))
            .unwrap();
        assert_eq!(def.row_count(), 6);
        assert!(def.mutations().get("row_count").is_none());

        let err = build(TableDefinition::builder("t").mutate("row_count", MutationRule::literal(-1)))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidRowCount { .. }));

        let err = build(TableDefinition::builder("t").mutate("row_count", MutationRule::literal("ten")))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidRowCount { .. }));
    }

    #[test]
    fn test_unknown_and_duplicate_columns() {
        let err = build(TableDefinition::builder("t").mutate("missing", MutationRule::literal(1)))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownColumn { ref column, .. } if column == "missing"));

        let column = ColumnDefinition::new(
            "id",
            ColumnType::Int32,
            DefaultGenerator::Sequential { start: 1, step: 1 },
        );
        let err = build(TableDefinition::builder("t").column(column.clone()).column(column)).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateColumn { .. }));

        let err = build(TableDefinition::builder("t").columns(Vec::new())).unwrap_err();
        assert!(matches!(err, DefinitionError::EmptyTable(_)));

        let err = build(TableDefinition::builder("")).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidName(_)));
    }

    #[test]
    fn test_invalid_defaults() {
        let overflowing = ColumnDefinition::new(
            "id",
            ColumnType::Int32,
            DefaultGenerator::Sequential {
                start: i32::MAX as i64 - 10,
                step: 1,
            },
        );
        let err = build(TableDefinition::builder("t").column(overflowing)).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidDefault { .. }));

        let null_in_required = ColumnDefinition::new("flag", ColumnType::Bool, DefaultGenerator::Null);
        let err = build(TableDefinition::builder("t").column(null_in_required)).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidDefault { .. }));

        let too_long = ColumnDefinition::new(
            "code",
            ColumnType::varchar(2),
            DefaultGenerator::Static {
                value: "abc".into(),
            },
        );
        let err = build(TableDefinition::builder("t").column(too_long)).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidDefault { .. }));

        let growing = ColumnDefinition::new(
            "code",
            ColumnType::varchar(5),
            DefaultGenerator::Pattern {
                pattern: "c{index}".to_string(),
            },
        );
        build(TableDefinition::builder("t").column(growing.clone()).row_count(10_000)).unwrap();
        let err = build(TableDefinition::builder("t").column(growing).row_count(20_000)).unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidDefault { ref column, .. } if column == "code"));
    }

    #[test]
    fn test_invalid_mutations() {
        let err = build(TableDefinition::builder("t").mutate("is_true", MutationSpec::Multiply { factor: 2 }))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidMutation { .. }));

        let err = build(TableDefinition::builder("t").mutate("is_not_null", MutationRule::literal(FixtureValue::Null)))
            .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidMutation { .. }));

        let err = build(TableDefinition::builder("t").mutate(
            "name",
            MutationSpec::EveryNth {
                n: 0,
                value: "x".into(),
                otherwise: "y".into(),
            },
        ))
        .unwrap_err();
        assert!(matches!(err, DefinitionError::InvalidMutation { .. }));

        // Custom rules are only checked when rows are generated.
        let def = build(
            TableDefinition::builder("t")
                .mutate("is_true", MutationRule::custom("anything/v1", |_, _| Ok(FixtureValue::Null))),
        )
        .unwrap();
        assert_eq!(def.mutations().len(), 1);
    }

    #[test]
    fn test_from_spec() {
        let schema = fixture_core::FixtureSchema::from_yaml(
            r#"
tables:
  - name: fails_column_value
    seed: 3
    mutations:
      value: { type: multiply, factor: 2 }
      row_count: 12
"#,
        )
        .unwrap();
        let spec = schema.tables.into_iter().next().unwrap();
        let def = build(TableDefinitionBuilder::from_spec(spec)).unwrap();
        assert_eq!(def.row_count(), 12);
        assert_eq!(def.seed(), 3);
        assert_eq!(def.mutations().columns(), vec!["value"]);
    }
}
