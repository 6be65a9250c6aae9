//! Declarative fixture definitions.
//!
//! This module holds the data half of a fixture table: columns with their
//! default generators, declarative mutation rules, and the YAML file format
//! that lists tables. Evaluation of generators and mutations lives in the
//! `fixture-generator` crate.
//!
//! ## YAML format
//!
//! ```yaml
//! default_row_count: 50
//! tables:
//!   - name: hundred_rows
//!     row_count: 101
//!     mutations:
//!       name: { type: pattern, pattern: "row_{index}" }
//!       is_true: false
//! ```
//!
//! Tables without a `columns` list use the standard parity column template.

use crate::types::ColumnType;
use crate::values::FixtureValue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Row count used when neither the file nor the table sets one.
pub const DEFAULT_ROW_COUNT: u64 = 50;

/// Reserved mutation key that overrides the target row count.
pub const ROW_COUNT_KEY: &str = "row_count";

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema file operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read definitions file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Table not found in schema
    #[error("Table not found: {0}")]
    TableNotFound(String),
}

// ============================================================================
// Columns and default generators
// ============================================================================

/// Default value generator for a column.
///
/// Every generator is a pure function of the row index (and, for the seeded
/// variants, the table seed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DefaultGenerator {
    /// `start + index * step`
    Sequential {
        /// Value for index 0
        #[serde(default)]
        start: i64,
        /// Increment per row
        #[serde(default = "default_step")]
        step: i64,
    },

    /// `even` on even indices, `odd` on odd ones
    Alternating {
        /// Value for even indices
        even: FixtureValue,
        /// Value for odd indices
        odd: FixtureValue,
    },

    /// The same value on every row
    Static {
        /// The static value to use
        value: FixtureValue,
    },

    /// String with `{index}`, `{row}`, `{index:0N}` and `{row:0N}` placeholders
    Pattern {
        /// Pattern string
        pattern: String,
    },

    /// `start + index * step_seconds`
    Timestamp {
        /// Timestamp for index 0
        start: NaiveDateTime,
        /// Seconds added per row
        #[serde(default)]
        step_seconds: i64,
    },

    /// Selection from a pool, driven by an RNG seeded from the row index
    OneOf {
        /// Pool of values to select from
        values: Vec<FixtureValue>,
    },

    /// Integer in `min..=max`, driven by an RNG seeded from the row index
    IntRange {
        /// Minimum value (inclusive)
        min: i64,
        /// Maximum value (inclusive)
        max: i64,
    },

    /// Null on every row
    #[default]
    Null,
}

fn default_step() -> i64 {
    1
}

/// Column of a fixture table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Whether this column is nullable
    #[serde(default)]
    pub nullable: bool,

    /// Whether this column is the table's primary key
    #[serde(default)]
    pub primary_key: bool,

    /// Generator for the column's default values
    #[serde(default)]
    pub default: DefaultGenerator,
}

impl ColumnDefinition {
    /// Create a new non-nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType, default: DefaultGenerator) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            primary_key: false,
            default,
        }
    }

    /// Create a new nullable column.
    pub fn nullable(
        name: impl Into<String>,
        column_type: ColumnType,
        default: DefaultGenerator,
    ) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            default,
        }
    }

    /// Mark this column as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

// ============================================================================
// Mutations
// ============================================================================

/// Declarative per-column override.
///
/// The serialized form of a spec is its stable representation in table
/// signatures, so field names here are part of the cache contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationSpec {
    /// Constant value
    Literal {
        /// The value to write
        value: FixtureValue,
    },

    /// Pattern string; `{value}` expands to the column's default value
    Pattern {
        /// Pattern string
        pattern: String,
    },

    /// Numeric default plus `amount`
    Add {
        /// Amount to add
        amount: i64,
    },

    /// Numeric default times `factor`
    Multiply {
        /// Factor to multiply by
        factor: i64,
    },

    /// Lower-cased string default
    Lowercase,

    /// Upper-cased string default
    Uppercase,

    /// `values[index % len]`
    Cycle {
        /// Values to cycle through
        values: Vec<FixtureValue>,
    },

    /// `value` when `index % n == 0`, otherwise `otherwise`
    EveryNth {
        /// Period
        n: u64,
        /// Value on every n-th row
        value: FixtureValue,
        /// Value on the remaining rows
        #[serde(default = "null_value")]
        otherwise: FixtureValue,
    },

    /// Timestamp default shifted by `offset_seconds + index * seconds_per_index`
    ShiftTime {
        /// Seconds added per row index
        seconds_per_index: i64,
        /// Constant offset in seconds
        #[serde(default)]
        offset_seconds: i64,
    },
}

fn null_value() -> FixtureValue {
    FixtureValue::Null
}

impl MutationSpec {
    /// Shorthand for a literal mutation.
    pub fn literal(value: impl Into<FixtureValue>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }
}

/// Mutation entry as written in YAML: either a tagged spec or a bare scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MutationDecl {
    /// Tagged declarative rule
    Spec(MutationSpec),

    /// Bare scalar, treated as a literal
    Literal(FixtureValue),
}

impl MutationDecl {
    /// Normalize into a `MutationSpec`.
    pub fn into_spec(self) -> MutationSpec {
        match self {
            Self::Spec(spec) => spec,
            Self::Literal(value) => MutationSpec::Literal { value },
        }
    }
}

// ============================================================================
// Definition files
// ============================================================================

/// One table entry of a definitions file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name
    pub name: String,

    /// Target row count (the `row_count` mutation key is an alias)
    #[serde(default)]
    pub row_count: Option<u64>,

    /// Seed for seeded default generators (defaults to 0)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Column list; the parity template is used when omitted
    #[serde(default)]
    pub columns: Option<Vec<ColumnDefinition>>,

    /// Per-column overrides
    #[serde(default)]
    pub mutations: BTreeMap<String, MutationDecl>,
}

/// Contents of a definitions file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSchema {
    /// Row count for tables that do not set one
    #[serde(default = "default_row_count")]
    pub default_row_count: u64,

    /// Tables, in registration order
    pub tables: Vec<TableSpec>,
}

fn default_row_count() -> u64 {
    DEFAULT_ROW_COUNT
}

impl FixtureSchema {
    /// Load a definitions file from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a definitions file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Get a table entry by name.
    pub fn get_table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Get a table entry by name, failing if absent.
    pub fn require_table(&self, name: &str) -> Result<&TableSpec, SchemaError> {
        self.get_table(name)
            .ok_or_else(|| SchemaError::TableNotFound(name.to_string()))
    }

    /// Get all table names in file order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
default_row_count: 20
tables:
  - name: hundred_rows
    row_count: 101
    mutations:
      name:
        type: pattern
        pattern: "row_{index}"
      is_true: false
  - name: custom_columns
    seed: 7
    columns:
      - name: id
        type: big_int
        default:
          type: sequential
          start: 1
      - name: code
        type:
          type: var_char
          length: 10
        nullable: true
        default:
          type: one_of
          values: [a, b, ~]
      - name: created_at
        type: date_time
        default:
          type: timestamp
          start: "2020-01-01T00:00:00"
          step_seconds: 86400
"#;

    #[test]
    fn test_parse_schema() {
        let schema = FixtureSchema::from_yaml(YAML).unwrap();
        assert_eq!(schema.default_row_count, 20);
        assert_eq!(schema.table_names(), vec!["hundred_rows", "custom_columns"]);

        let hundred = schema.get_table("hundred_rows").unwrap();
        assert_eq!(hundred.row_count, Some(101));
        assert!(hundred.columns.is_none());
        assert_eq!(
            hundred.mutations.get("name").cloned().map(MutationDecl::into_spec),
            Some(MutationSpec::Pattern {
                pattern: "row_{index}".to_string()
            })
        );
        assert_eq!(
            hundred.mutations.get("is_true").cloned().map(MutationDecl::into_spec),
            Some(MutationSpec::literal(false))
        );
    }

    #[test]
    fn test_parse_columns() {
        let schema = FixtureSchema::from_yaml(YAML).unwrap();
        let table = schema.require_table("custom_columns").unwrap();
        let columns = table.columns.as_ref().unwrap();

        assert_eq!(table.seed, Some(7));
        assert_eq!(columns.len(), 3);
        assert_eq!(
            columns[0].default,
            DefaultGenerator::Sequential { start: 1, step: 1 }
        );
        assert!(columns[1].nullable);
        assert_eq!(columns[1].column_type, ColumnType::varchar(10));
        assert_eq!(
            columns[1].default,
            DefaultGenerator::OneOf {
                values: vec!["a".into(), "b".into(), FixtureValue::Null]
            }
        );
        assert!(matches!(
            columns[2].default,
            DefaultGenerator::Timestamp {
                step_seconds: 86400,
                ..
            }
        ));
    }

    #[test]
    fn test_default_row_count_and_missing_table() {
        let schema = FixtureSchema::from_yaml("tables: []").unwrap();
        assert_eq!(schema.default_row_count, DEFAULT_ROW_COUNT);
        assert!(matches!(
            schema.require_table("nope"),
            Err(SchemaError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_every_nth_defaults_to_null() {
        let spec: MutationSpec = serde_yaml::from_str("{ type: every_nth, n: 3, value: test }").unwrap();
        assert_eq!(
            spec,
            MutationSpec::EveryNth {
                n: 3,
                value: "test".into(),
                otherwise: FixtureValue::Null,
            }
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let schema = FixtureSchema::from_file(file.path()).unwrap();
        assert_eq!(schema.tables.len(), 2);

        assert!(matches!(
            FixtureSchema::from_file("/nonexistent/definitions.yaml"),
            Err(SchemaError::IoError(_))
        ));
    }
}
