//! Column types for fixture tables.
//!
//! `ColumnType` is the small type universe a fixture column can be declared
//! with. Stores derive their DDL from it via the [`ToDdl`] trait.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Declared type of a fixture column.
///
/// # YAML Format
///
/// Simple types are written as strings:
/// ```yaml
/// type: int
/// type: bool
/// type: date_time
/// ```
///
/// Parameterised types use the object format:
/// ```yaml
/// type:
///   type: var_char
///   length: 50
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Boolean value
    Bool,

    /// 32-bit signed integer
    Int32,

    /// 64-bit signed integer
    Int64,

    /// 64-bit IEEE 754 floating point
    Float64,

    /// Variable-length character string with max length
    VarChar {
        /// Maximum length in characters
        length: u16,
    },

    /// Unlimited text
    Text,

    /// Timestamp without timezone
    LocalDateTime,
}

impl ColumnType {
    /// Create a new VarChar type with the given length.
    pub fn varchar(length: u16) -> Self {
        Self::VarChar { length }
    }

    /// Check if this type represents a numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64 | Self::Float64)
    }

    /// Check if this type represents a string type.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::VarChar { .. } | Self::Text)
    }

    /// Simple name used in YAML and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int",
            Self::Int64 => "big_int",
            Self::Float64 => "double",
            Self::VarChar { .. } => "var_char",
            Self::Text => "text",
            Self::LocalDateTime => "date_time",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VarChar { length } => write!(f, "var_char({length})"),
            other => f.write_str(other.name()),
        }
    }
}

fn simple_type(name: &str) -> Option<ColumnType> {
    match name {
        "bool" | "boolean" => Some(ColumnType::Bool),
        "int" | "integer" => Some(ColumnType::Int32),
        "big_int" | "bigint" => Some(ColumnType::Int64),
        "double" | "float" => Some(ColumnType::Float64),
        "text" => Some(ColumnType::Text),
        "date_time" | "datetime" => Some(ColumnType::LocalDateTime),
        _ => None,
    }
}

// Simple types serialize as strings ("int"), parameterised ones as maps
// ({"type": "var_char", "length": 50}).

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            Self::VarChar { length } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "var_char")?;
                map.serialize_entry("length", length)?;
                map.end()
            }
            other => serializer.serialize_str(other.name()),
        }
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{Error, MapAccess, Visitor};

        struct ColumnTypeVisitor;

        impl<'de> Visitor<'de> for ColumnTypeVisitor {
            type Value = ColumnType;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or map representing a column type")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                simple_type(value).ok_or_else(|| E::custom(format!("unknown simple type: {value}")))
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut type_name: Option<String> = None;
                let mut fields: HashMap<String, serde_yaml::Value> = HashMap::new();

                while let Some(key) = map.next_key::<String>()? {
                    if key == "type" {
                        type_name = Some(map.next_value()?);
                    } else {
                        fields.insert(key, map.next_value()?);
                    }
                }

                let type_name = type_name.ok_or_else(|| M::Error::missing_field("type"))?;

                match type_name.as_str() {
                    "var_char" | "varchar" => {
                        let value = fields
                            .get("length")
                            .ok_or_else(|| M::Error::missing_field("length"))?;
                        let length: u16 = serde_yaml::from_value(value.clone())
                            .map_err(|e| M::Error::custom(format!("invalid field 'length': {e}")))?;
                        Ok(ColumnType::VarChar { length })
                    }
                    other => simple_type(other)
                        .ok_or_else(|| M::Error::custom(format!("unknown type: {other}"))),
                }
            }
        }

        deserializer.deserialize_any(ColumnTypeVisitor)
    }
}

/// Trait for generating DDL statements from `ColumnType`.
///
/// Each store implements this to render column types in its own dialect.
pub trait ToDdl {
    /// Generate the DDL type definition for the given `ColumnType`.
    fn to_ddl(&self, column_type: &ColumnType) -> String;
}
