//! Per-column value overrides.
//!
//! A [`MutationSet`] maps column names to [`MutationRule`]s. Every rule is
//! evaluated against the row's pristine defaults, so the order in which
//! rules run is never observable.

use crate::generators::pattern::expand_pattern;
use chrono::Duration;
use fixture_core::{FixtureValue, GeneratedRow, MutationSpec};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Error raised by a single mutation rule.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    /// The rule cannot operate on the column's default value
    #[error("{rule} cannot be applied to a {found} value")]
    NotApplicable {
        rule: &'static str,
        found: &'static str,
    },

    /// Arithmetic overflow
    #[error("{0} overflowed")]
    Overflow(&'static str),

    /// The column the rule reads is missing from the row
    #[error("column '{0}' is missing from the row")]
    MissingColumn(String),

    /// Failure reported by a custom rule
    #[error("{0}")]
    Failed(String),
}

impl MutationError {
    /// Failure with a free-form message, for custom rules.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Signature of a custom mutation closure: `(index, pristine_row) -> value`.
pub type MutationFn =
    dyn Fn(u64, &GeneratedRow) -> Result<FixtureValue, MutationError> + Send + Sync;

/// Mutation implemented in Rust, identified by a caller-declared id.
///
/// The id is what enters the table signature: change it whenever the
/// closure's behaviour changes. The closure must be a pure function of its
/// arguments for generated data to be reproducible.
#[derive(Clone)]
pub struct CustomMutation {
    id: String,
    apply: Arc<MutationFn>,
}

impl CustomMutation {
    /// Create a custom mutation with a stable identifier.
    pub fn new<F>(id: impl Into<String>, apply: F) -> Self
    where
        F: Fn(u64, &GeneratedRow) -> Result<FixtureValue, MutationError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            apply: Arc::new(apply),
        }
    }

    /// The declared identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for CustomMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMutation").field("id", &self.id).finish()
    }
}

/// One column override.
#[derive(Debug, Clone)]
pub enum MutationRule {
    /// Declarative rule (also what definition files produce)
    Declared(MutationSpec),

    /// Rust closure with a declared identifier
    Custom(CustomMutation),
}

impl MutationRule {
    /// Constant value.
    pub fn literal(value: impl Into<FixtureValue>) -> Self {
        Self::Declared(MutationSpec::literal(value))
    }

    /// Custom closure with a stable identifier.
    pub fn custom<F>(id: impl Into<String>, apply: F) -> Self
    where
        F: Fn(u64, &GeneratedRow) -> Result<FixtureValue, MutationError> + Send + Sync + 'static,
    {
        Self::Custom(CustomMutation::new(id, apply))
    }

    /// Representation of this rule inside a table signature.
    ///
    /// Literals contribute `{"literal": value}`, declarative rules their
    /// serialized body (always carrying a `type` key) and custom rules
    /// `{"custom": id}`, so no two kinds of rule can share a representation.
    pub fn stable_repr(&self) -> serde_json::Value {
        match self {
            Self::Declared(MutationSpec::Literal { value }) => {
                serde_json::json!({ "literal": literal_repr(value) })
            }
            Self::Declared(spec) => serde_json::to_value(spec).unwrap_or(serde_json::Value::Null),
            Self::Custom(custom) => serde_json::json!({ "custom": custom.id }),
        }
    }

    /// Compute the new value of `column` for row `index`.
    pub fn evaluate(
        &self,
        column: &str,
        index: u64,
        row: &GeneratedRow,
    ) -> Result<FixtureValue, MutationError> {
        match self {
            Self::Declared(spec) => evaluate_spec(spec, column, index, row),
            Self::Custom(custom) => (custom.apply)(index, row),
        }
    }
}

/// JSON has no NaN or infinities; spell non-finite floats out so they do
/// not collapse into `null`.
fn literal_repr(value: &FixtureValue) -> serde_json::Value {
    match value {
        FixtureValue::Float64(f) if !f.is_finite() => serde_json::json!({ "float": f.to_string() }),
        other => serde_json::to_value(other).unwrap_or(serde_json::Value::Null),
    }
}

impl From<MutationSpec> for MutationRule {
    fn from(spec: MutationSpec) -> Self {
        Self::Declared(spec)
    }
}

impl From<CustomMutation> for MutationRule {
    fn from(custom: CustomMutation) -> Self {
        Self::Custom(custom)
    }
}

fn current<'a>(column: &str, row: &'a GeneratedRow) -> Result<&'a FixtureValue, MutationError> {
    row.get(column)
        .ok_or_else(|| MutationError::MissingColumn(column.to_string()))
}

fn evaluate_spec(
    spec: &MutationSpec,
    column: &str,
    index: u64,
    row: &GeneratedRow,
) -> Result<FixtureValue, MutationError> {
    match spec {
        MutationSpec::Literal { value } => Ok(value.clone()),

        MutationSpec::Pattern { pattern } => Ok(FixtureValue::String(expand_pattern(
            pattern,
            index,
            row.get(column),
        ))),

        MutationSpec::Add { amount } => match current(column, row)? {
            FixtureValue::Int32(v) => (*v as i64)
                .checked_add(*amount)
                .map(FixtureValue::Int64)
                .ok_or(MutationError::Overflow("add")),
            FixtureValue::Int64(v) => v
                .checked_add(*amount)
                .map(FixtureValue::Int64)
                .ok_or(MutationError::Overflow("add")),
            FixtureValue::Float64(v) => Ok(FixtureValue::Float64(v + *amount as f64)),
            other => Err(MutationError::NotApplicable {
                rule: "add",
                found: other.kind(),
            }),
        },

        MutationSpec::Multiply { factor } => match current(column, row)? {
            FixtureValue::Int32(v) => (*v as i64)
                .checked_mul(*factor)
                .map(FixtureValue::Int64)
                .ok_or(MutationError::Overflow("multiply")),
            FixtureValue::Int64(v) => v
                .checked_mul(*factor)
                .map(FixtureValue::Int64)
                .ok_or(MutationError::Overflow("multiply")),
            FixtureValue::Float64(v) => Ok(FixtureValue::Float64(v * *factor as f64)),
            other => Err(MutationError::NotApplicable {
                rule: "multiply",
                found: other.kind(),
            }),
        },

        MutationSpec::Lowercase => match current(column, row)? {
            FixtureValue::String(s) => Ok(FixtureValue::String(s.to_lowercase())),
            other => Err(MutationError::NotApplicable {
                rule: "lowercase",
                found: other.kind(),
            }),
        },

        MutationSpec::Uppercase => match current(column, row)? {
            FixtureValue::String(s) => Ok(FixtureValue::String(s.to_uppercase())),
            other => Err(MutationError::NotApplicable {
                rule: "uppercase",
                found: other.kind(),
            }),
        },

        MutationSpec::Cycle { values } => {
            if values.is_empty() {
                return Err(MutationError::failed("cycle has no values"));
            }
            Ok(values[(index % values.len() as u64) as usize].clone())
        }

        MutationSpec::EveryNth {
            n,
            value,
            otherwise,
        } => {
            if *n == 0 {
                return Err(MutationError::failed("every_nth period is zero"));
            }
            Ok(if index % n == 0 {
                value.clone()
            } else {
                otherwise.clone()
            })
        }

        MutationSpec::ShiftTime {
            seconds_per_index,
            offset_seconds,
        } => match current(column, row)? {
            FixtureValue::DateTime(dt) => i64::try_from(index)
                .ok()
                .and_then(|i| seconds_per_index.checked_mul(i))
                .and_then(|s| s.checked_add(*offset_seconds))
                .and_then(Duration::try_seconds)
                .and_then(|shift| dt.checked_add_signed(shift))
                .map(FixtureValue::DateTime)
                .ok_or(MutationError::Overflow("shift_time")),
            other => Err(MutationError::NotApplicable {
                rule: "shift_time",
                found: other.kind(),
            }),
        },
    }
}

/// A rule failed while mutating one column.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("mutation of '{column}' failed: {source}")]
pub struct MutationFailure {
    /// Column whose rule failed
    pub column: String,
    /// Underlying error
    #[source]
    pub source: MutationError,
}

/// Column name to rule mapping for one table.
///
/// The reserved `row_count` key never appears here; table builders consume
/// it as the target row count.
#[derive(Debug, Clone, Default)]
pub struct MutationSet {
    rules: BTreeMap<String, MutationRule>,
}

impl MutationSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the rule for `column`.
    pub fn insert(&mut self, column: impl Into<String>, rule: MutationRule) -> Option<MutationRule> {
        self.rules.insert(column.into(), rule)
    }

    /// Get the rule for `column`.
    pub fn get(&self, column: &str) -> Option<&MutationRule> {
        self.rules.get(column)
    }

    /// Iterate rules in column-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MutationRule)> {
        self.rules.iter().map(|(column, rule)| (column.as_str(), rule))
    }

    /// Names of the mutated columns.
    pub fn columns(&self) -> Vec<&str> {
        self.rules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Apply every rule in `mutations` to `default_row`.
///
/// Rules read from the untouched `default_row` and write into a copy, so a
/// rule never observes another rule's output.
pub fn apply_mutations(
    index: u64,
    default_row: GeneratedRow,
    mutations: &MutationSet,
) -> Result<GeneratedRow, MutationFailure> {
    if mutations.is_empty() {
        return Ok(default_row);
    }

    let mut mutated = default_row.clone();
    for (column, rule) in mutations.iter() {
        let value = rule
            .evaluate(column, index, &default_row)
            .map_err(|source| MutationFailure {
                column: column.to_string(),
                source,
            })?;
        mutated.set(column, value);
    }
    Ok(mutated)
}
