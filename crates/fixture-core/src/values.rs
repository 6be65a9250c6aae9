//! Value representations for fixture rows.
//!
//! `FixtureValue` is the type-agnostic value produced by default generators
//! and mutations. Before a value reaches a store it is coerced to the
//! declared [`ColumnType`] of its column.

use crate::types::ColumnType;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Accepted textual timestamp formats, tried in order.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Error raised when a value cannot be stored in a column.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// Value kind does not fit the column type
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: ColumnType,
        found: &'static str,
    },

    /// Integer outside the column's range
    #[error("{value} is out of range for {expected}")]
    OutOfRange { expected: ColumnType, value: i64 },

    /// String longer than the column allows
    #[error("string of {length} characters exceeds var_char({max})")]
    TooLong { length: usize, max: u16 },

    /// String that does not parse as a timestamp
    #[error("'{0}' is not a valid timestamp")]
    InvalidTimestamp(String),
}

/// Raw value of one column in a generated row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureValue {
    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int32(i32),

    /// 64-bit signed integer
    Int64(i64),

    /// 64-bit floating point
    Float64(f64),

    /// String value
    String(String),

    /// Timestamp without timezone
    DateTime(NaiveDateTime),

    /// Null value
    Null,
}

impl FixtureValue {
    /// Create a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int",
            Self::Int64(_) => "big_int",
            Self::Float64(_) => "double",
            Self::String(_) => "string",
            Self::DateTime(_) => "date_time",
            Self::Null => "null",
        }
    }

    /// Try to get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            Self::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float64(f) => Some(*f),
            Self::Int32(i) => Some(*i as f64),
            Self::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a timestamp.
    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    /// Render the value as plain text, as substituted into string patterns.
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int32(i) => i.to_string(),
            Self::Int64(i) => i.to_string(),
            Self::Float64(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Self::Null => String::new(),
        }
    }

    /// Convert this value into the representation required by `column_type`.
    ///
    /// Null passes through unchanged; nullability is the caller's concern.
    pub fn coerce_to(self, column_type: &ColumnType) -> Result<FixtureValue, ValueError> {
        let mismatch = |found: &'static str| ValueError::TypeMismatch {
            expected: column_type.clone(),
            found,
        };

        match (column_type, self) {
            (_, Self::Null) => Ok(Self::Null),

            (ColumnType::Bool, Self::Bool(b)) => Ok(Self::Bool(b)),

            (ColumnType::Int32, Self::Int32(i)) => Ok(Self::Int32(i)),
            (ColumnType::Int32, Self::Int64(i)) => i32::try_from(i)
                .map(Self::Int32)
                .map_err(|_| ValueError::OutOfRange {
                    expected: column_type.clone(),
                    value: i,
                }),

            (ColumnType::Int64, Self::Int32(i)) => Ok(Self::Int64(i as i64)),
            (ColumnType::Int64, Self::Int64(i)) => Ok(Self::Int64(i)),

            (ColumnType::Float64, Self::Float64(f)) => Ok(Self::Float64(f)),
            (ColumnType::Float64, Self::Int32(i)) => Ok(Self::Float64(i as f64)),
            (ColumnType::Float64, Self::Int64(i)) => Ok(Self::Float64(i as f64)),

            (ColumnType::VarChar { length }, Self::String(s)) => {
                let chars = s.chars().count();
                if chars > *length as usize {
                    Err(ValueError::TooLong {
                        length: chars,
                        max: *length,
                    })
                } else {
                    Ok(Self::String(s))
                }
            }
            (ColumnType::Text, Self::String(s)) => Ok(Self::String(s)),

            (ColumnType::LocalDateTime, Self::DateTime(dt)) => Ok(Self::DateTime(dt)),
            (ColumnType::LocalDateTime, Self::String(s)) => parse_datetime(&s)
                .map(Self::DateTime)
                .ok_or(ValueError::InvalidTimestamp(s)),

            (_, other) => Err(mismatch(other.kind())),
        }
    }
}

impl From<bool> for FixtureValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FixtureValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<i64> for FixtureValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for FixtureValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for FixtureValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FixtureValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDateTime> for FixtureValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<FixtureValue>> From<Option<T>> for FixtureValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Parse a timestamp in ISO 8601 (with or without the `T`) or date-only form.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// One generated row: column name to value, plus the row index.
///
/// Rows are transient; they live from generation until their batch is
/// inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRow {
    /// Row index (selects which generated and mutated values apply)
    pub index: u64,

    /// Field values (column name -> value)
    pub fields: HashMap<String, FixtureValue>,
}

impl GeneratedRow {
    /// Create a new generated row.
    pub fn new(index: u64, fields: HashMap<String, FixtureValue>) -> Self {
        Self { index, fields }
    }

    /// Create a new generated row with a builder pattern.
    pub fn builder(index: u64) -> GeneratedRowBuilder {
        GeneratedRowBuilder {
            index,
            fields: HashMap::new(),
        }
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&FixtureValue> {
        self.fields.get(name)
    }

    /// Replace a field value, returning the previous one.
    pub fn set(&mut self, name: impl Into<String>, value: FixtureValue) -> Option<FixtureValue> {
        self.fields.insert(name.into(), value)
    }

    /// Get the number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Builder for `GeneratedRow`.
pub struct GeneratedRowBuilder {
    index: u64,
    fields: HashMap<String, FixtureValue>,
}

impl GeneratedRowBuilder {
    /// Add a field to the row.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FixtureValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Build the row.
    pub fn build(self) -> GeneratedRow {
        GeneratedRow {
            index: self.index,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(FixtureValue::Bool(true).as_bool(), Some(true));
        assert_eq!(FixtureValue::Int32(42).as_i64(), Some(42));
        assert_eq!(FixtureValue::Int64(100).as_f64(), Some(100.0));
        assert_eq!(FixtureValue::string("test").as_str(), Some("test"));
        assert_eq!(FixtureValue::Bool(true).as_i64(), None);
        assert!(FixtureValue::Null.is_null());
    }

    #[test]
    fn test_untagged_yaml() {
        let value: FixtureValue = serde_yaml::from_str("42").unwrap();
        assert_eq!(value, FixtureValue::Int32(42));

        let value: FixtureValue = serde_yaml::from_str("5000000000").unwrap();
        assert_eq!(value, FixtureValue::Int64(5_000_000_000));

        let value: FixtureValue = serde_yaml::from_str("~").unwrap();
        assert_eq!(value, FixtureValue::Null);

        let value: FixtureValue = serde_yaml::from_str("\"2020-01-01T00:00:00\"").unwrap();
        assert_eq!(value, FixtureValue::string("2020-01-01T00:00:00"));
    }

    #[test]
    fn test_coerce_integers() {
        assert_eq!(
            FixtureValue::Int64(7).coerce_to(&ColumnType::Int32),
            Ok(FixtureValue::Int32(7))
        );
        assert_eq!(
            FixtureValue::Int32(7).coerce_to(&ColumnType::Int64),
            Ok(FixtureValue::Int64(7))
        );
        assert!(matches!(
            FixtureValue::Int64(i64::MAX).coerce_to(&ColumnType::Int32),
            Err(ValueError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_coerce_strings() {
        assert!(FixtureValue::string("abc")
            .coerce_to(&ColumnType::varchar(3))
            .is_ok());
        assert_eq!(
            FixtureValue::string("abcd").coerce_to(&ColumnType::varchar(3)),
            Err(ValueError::TooLong { length: 4, max: 3 })
        );
        assert!(matches!(
            FixtureValue::Bool(true).coerce_to(&ColumnType::Text),
            Err(ValueError::TypeMismatch { found: "bool", .. })
        ));
    }

    #[test]
    fn test_coerce_timestamps() {
        let coerced = FixtureValue::string("2020-01-01 12:30:00")
            .coerce_to(&ColumnType::LocalDateTime)
            .unwrap();
        assert_eq!(coerced, FixtureValue::DateTime(dt("2020-01-01T12:30:00")));

        assert_eq!(
            parse_datetime("2020-01-01"),
            Some(dt("2020-01-01T00:00:00"))
        );
        assert!(matches!(
            FixtureValue::string("yesterday").coerce_to(&ColumnType::LocalDateTime),
            Err(ValueError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_null_passes_through() {
        assert_eq!(
            FixtureValue::Null.coerce_to(&ColumnType::Bool),
            Ok(FixtureValue::Null)
        );
    }

    #[test]
    fn test_generated_row_builder() {
        let row = GeneratedRow::builder(3)
            .field("name", "Alice")
            .field("value", 30)
            .field("missing", None::<bool>)
            .build();

        assert_eq!(row.index, 3);
        assert_eq!(row.field_count(), 3);
        assert_eq!(row.get("name"), Some(&FixtureValue::string("Alice")));
        assert_eq!(row.get("value"), Some(&FixtureValue::Int32(30)));
        assert_eq!(row.get("missing"), Some(&FixtureValue::Null));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(FixtureValue::Int32(12).to_text(), "12");
        assert_eq!(
            FixtureValue::DateTime(dt("2020-01-02T03:04:05")).to_text(),
            "2020-01-02T03:04:05"
        );
        assert_eq!(FixtureValue::Null.to_text(), "");
    }
}
