//! Table signatures.
//!
//! A signature fingerprints everything that decides a table's generated
//! contents: name, registry position, row count, seed, columns and the
//! stable representation of every mutation rule. It is computed from a
//! canonical JSON document (object keys sorted at every level) hashed with
//! SHA-256 and truncated to 128 bits.

use crate::definition::TableDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of digest bytes kept in a signature.
const SIGNATURE_BYTES: usize = 16;

/// Hex-encoded fingerprint of a table's generation contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Wrap a signature read back from a store.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the signature of `definition`.
///
/// Pure: the same definition always yields the same signature, across
/// processes and machines.
pub fn compute_signature(definition: &TableDefinition) -> Signature {
    let mutations: Map<String, Value> = definition
        .mutations()
        .iter()
        .map(|(column, rule)| (column.to_string(), rule.stable_repr()))
        .collect();

    let document = json!({
        "table_name": definition.name(),
        "id": definition.position(),
        "row_count": definition.row_count(),
        "seed": definition.seed(),
        "columns": serde_json::to_value(definition.columns()).unwrap_or(Value::Null),
        "mutations": mutations,
    });

    let mut canonical = String::new();
    write_canonical(&document, &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());
    Signature(hex::encode(&digest[..SIGNATURE_BYTES]))
}

/// Serialize `value` with object keys sorted, independent of how
/// `serde_json::Map` orders them.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TableDefinitionBuilder;
    use crate::mutation::MutationRule;
    use fixture_core::{FixtureValue, MutationSpec};

    fn signature_of(builder: TableDefinitionBuilder, position: usize) -> Signature {
        builder.build(position, 50).unwrap().signature().clone()
    }

    #[test]
    fn test_signature_is_stable() {
        let a = signature_of(TableDefinitionBuilder::new("test_table"), 0);
        let b = signature_of(TableDefinitionBuilder::new("test_table"), 0);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_sensitivity() {
        let base = signature_of(TableDefinitionBuilder::new("t"), 0);

        assert_ne!(base, signature_of(TableDefinitionBuilder::new("u"), 0));
        assert_ne!(base, signature_of(TableDefinitionBuilder::new("t"), 1));
        assert_ne!(base, signature_of(TableDefinitionBuilder::new("t").row_count(51), 0));
        assert_ne!(base, signature_of(TableDefinitionBuilder::new("t").seed(9), 0));

        let doubled = signature_of(
            TableDefinitionBuilder::new("t").mutate("value", MutationSpec::Multiply { factor: 2 }),
            0,
        );
        let tripled = signature_of(
            TableDefinitionBuilder::new("t").mutate("value", MutationSpec::Multiply { factor: 3 }),
            0,
        );
        assert_ne!(base, doubled);
        assert_ne!(doubled, tripled);
    }

    #[test]
    fn test_custom_rules_hash_their_id() {
        let v1 = |f: fn(u64) -> i64| {
            signature_of(
                TableDefinitionBuilder::new("t").mutate(
                    "value",
                    MutationRule::custom("bump/v1", move |i, _| Ok(FixtureValue::Int64(f(i)))),
                ),
                0,
            )
        };
        // Different closures under the same id share a signature.
        assert_eq!(v1(|i| i as i64), v1(|i| i as i64 * 2));

        let v2 = signature_of(
            TableDefinitionBuilder::new("t").mutate(
                "value",
                MutationRule::custom("bump/v2", |i, _| Ok(FixtureValue::Int64(i as i64))),
            ),
            0,
        );
        assert_ne!(v1(|i| i as i64), v2);
    }

    #[test]
    fn test_row_count_key_matches_row_count() {
        let via_key = signature_of(
            TableDefinitionBuilder::new("t").mutate("row_count", MutationRule::literal(6)),
            0,
        );
        let via_builder = signature_of(TableDefinitionBuilder::new("t").row_count(6), 0);
        assert_eq!(via_key, via_builder);
    }

    #[test]
    fn test_canonical_key_order() {
        let mut out = String::new();
        write_canonical(&json!({"b": 1, "a": {"d": [true, null], "c": "x"}}), &mut out);
        assert_eq!(out, r#"{"a":{"c":"x","d":[true,null]},"b":1}"#);
    }
}
