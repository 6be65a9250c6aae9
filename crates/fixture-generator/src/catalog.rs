//! Built-in parity test tables.
//!
//! Every table shares the parity column template; each one differs from
//! `test_table` in a single, deliberate way that a parity check is expected
//! to catch.

use crate::definition::{DefinitionError, TableDefinition};
use crate::mutation::{MutationError, MutationRule};
use crate::registry::TableRegistry;
use chrono::NaiveDate;
use fixture_core::{ColumnDefinition, ColumnType, DefaultGenerator, FixtureValue, MutationSpec};

const PERSON_NAMES: [&str; 4] = ["John", "Paul", "George", "Ringo"];

fn epoch() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Column template shared by all parity tables.
pub fn parity_columns() -> Vec<ColumnDefinition> {
    let string = ColumnType::varchar(50);
    vec![
        ColumnDefinition::new(
            "id",
            ColumnType::Int32,
            DefaultGenerator::Sequential { start: 1, step: 1 },
        )
        .primary_key(),
        ColumnDefinition::nullable(
            "name",
            string.clone(),
            DefaultGenerator::Alternating {
                even: "test".into(),
                odd: "TEST".into(),
            },
        ),
        ColumnDefinition::nullable(
            "sometimes_null",
            string,
            DefaultGenerator::Alternating {
                even: "test".into(),
                odd: FixtureValue::Null,
            },
        ),
        ColumnDefinition::nullable(
            "value",
            ColumnType::Int32,
            DefaultGenerator::Sequential {
                start: 10,
                step: 10,
            },
        ),
        ColumnDefinition::nullable(
            "created_at",
            ColumnType::LocalDateTime,
            DefaultGenerator::Timestamp {
                start: epoch(),
                step_seconds: 0,
            },
        ),
        ColumnDefinition::nullable(
            "updated_at",
            ColumnType::LocalDateTime,
            DefaultGenerator::Timestamp {
                start: epoch(),
                step_seconds: 86_400,
            },
        ),
        ColumnDefinition::nullable(
            "is_true",
            ColumnType::Bool,
            DefaultGenerator::Static { value: true.into() },
        ),
        ColumnDefinition::nullable(
            "is_false",
            ColumnType::Bool,
            DefaultGenerator::Static {
                value: false.into(),
            },
        ),
        ColumnDefinition::nullable("is_null", ColumnType::Bool, DefaultGenerator::Null),
        ColumnDefinition::new(
            "is_not_null",
            ColumnType::Bool,
            DefaultGenerator::Alternating {
                even: true.into(),
                odd: false.into(),
            },
        ),
    ]
}

fn pattern(pattern: &str) -> MutationSpec {
    MutationSpec::Pattern {
        pattern: pattern.to_string(),
    }
}

fn shift_hours(hours_per_index: i64) -> MutationSpec {
    MutationSpec::ShiftTime {
        seconds_per_index: hours_per_index * 3600,
        offset_seconds: 0,
    }
}

/// Add 1 to `value` for rows whose index satisfies `bad`.
fn bump_value_where(id: &str, bad: fn(u64) -> bool) -> MutationRule {
    MutationRule::custom(id, move |index, row| {
        let value = row.get("value").cloned().unwrap_or(FixtureValue::Null);
        if !bad(index) {
            return Ok(value);
        }
        match value.as_i64() {
            Some(v) => v
                .checked_add(1)
                .map(FixtureValue::Int64)
                .ok_or(MutationError::Overflow("add")),
            None => Ok(value),
        }
    })
}

/// Registry holding every built-in parity table, in canonical order.
pub fn parity_registry() -> Result<TableRegistry, DefinitionError> {
    let names: Vec<FixtureValue> = PERSON_NAMES.iter().map(|&n| n.into()).collect();
    let mut names_or_null = names.clone();
    names_or_null.push(FixtureValue::Null);

    let builders = vec![
        TableDefinition::builder("test_table"),
        TableDefinition::builder("test_table2"),
        TableDefinition::builder("fails_row_count").row_count(6),
        TableDefinition::builder("fails_cardinality").mutate("name", MutationSpec::Lowercase),
        TableDefinition::builder("fails_column_value").mutate("is_true", MutationRule::literal(false)),
        TableDefinition::builder("fails_column_value2")
            .mutate("value", MutationSpec::Add { amount: 1 }),
        TableDefinition::builder("fails_null_count").mutate(
            "sometimes_null",
            MutationSpec::EveryNth {
                n: 3,
                value: "test".into(),
                otherwise: FixtureValue::Null,
            },
        ),
        TableDefinition::builder("fails_case_sensitive").mutate("name", MutationSpec::Uppercase),
        TableDefinition::builder("UpperCaseName").mutate("name", MutationSpec::Uppercase),
        TableDefinition::builder("fails_pii")
            .mutate("name", MutationSpec::Cycle { values: names })
            .mutate(
                "sometimes_null",
                MutationSpec::Cycle {
                    values: names_or_null,
                },
            ),
        TableDefinition::builder("hundred_rows")
            .row_count(101)
            .mutate("name", pattern("row_{index}")),
        TableDefinition::builder("hundred_thousand_rows")
            .row_count(100_000)
            .mutate("name", pattern("row_{index}")),
        TableDefinition::builder("hundred_thousand_bad_rows")
            .row_count(100_000)
            .mutate("name", pattern("bad_row_{index}"))
            .mutate("value", MutationSpec::Multiply { factor: 3 })
            .mutate("created_at", shift_hours(1))
            .mutate("updated_at", shift_hours(2)),
        TableDefinition::builder("million_rows")
            .row_count(1_000_000)
            .mutate("name", pattern("row_{index}")),
        TableDefinition::builder("million_bad_rows")
            .row_count(1_000_000)
            .mutate("name", pattern("bad_row_{index}"))
            .mutate("value", MutationSpec::Multiply { factor: 2 })
            .mutate("created_at", shift_hours(1))
            .mutate("updated_at", shift_hours(2)),
        TableDefinition::builder("half_bad_value")
            .mutate("value", bump_value_where("half_bad_value/v1", |i| i < 25)),
        TableDefinition::builder("realish_id")
            .row_count(1000)
            .mutate("name", pattern("ABC000{row:03}")),
        TableDefinition::builder("realish_id_bad_dates")
            .row_count(1000)
            .mutate("name", pattern("ABC000{row:03}"))
            .mutate(
                "value",
                bump_value_where("realish_id_bad_dates/v1", |i| 475 < i && i < 525),
            ),
    ];

    let mut registry = TableRegistry::new();
    for builder in builders {
        registry.register(builder)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::RowGenerator;

    #[test]
    fn test_catalog_order_and_counts() {
        let registry = parity_registry().unwrap();
        assert_eq!(registry.len(), 18);
        assert_eq!(registry.names()[0], "test_table");
        assert_eq!(registry.names()[17], "realish_id_bad_dates");

        let counts: Vec<(&str, u64)> = registry
            .tables()
            .iter()
            .map(|t| (t.name(), t.row_count()))
            .filter(|(_, count)| *count != 50)
            .collect();
        assert_eq!(
            counts,
            vec![
                ("fails_row_count", 6),
                ("hundred_rows", 101),
                ("hundred_thousand_rows", 100_000),
                ("hundred_thousand_bad_rows", 100_000),
                ("million_rows", 1_000_000),
                ("million_bad_rows", 1_000_000),
                ("realish_id", 1000),
                ("realish_id_bad_dates", 1000),
            ]
        );
    }

    #[test]
    fn test_identical_contracts_get_distinct_signatures() {
        let registry = parity_registry().unwrap();
        let a = registry.require("fails_case_sensitive").unwrap();
        let b = registry.require("UpperCaseName").unwrap();
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_half_bad_value() {
        let registry = parity_registry().unwrap();
        let def = registry.require("half_bad_value").unwrap();
        let generator = RowGenerator::new(def);

        let value = |i| generator.generate_mutated(i).unwrap().get("value").cloned();
        assert_eq!(value(0), Some(FixtureValue::Int32(11)));
        assert_eq!(value(24), Some(FixtureValue::Int32(251)));
        assert_eq!(value(25), Some(FixtureValue::Int32(260)));
    }

    #[test]
    fn test_realish_ids_and_bad_dates() {
        let registry = parity_registry().unwrap();
        let def = registry.require("realish_id_bad_dates").unwrap();
        let generator = RowGenerator::new(def);

        let first = generator.generate_mutated(0).unwrap();
        assert_eq!(first.get("name"), Some(&FixtureValue::string("ABC000001")));
        assert_eq!(first.get("value"), Some(&FixtureValue::Int32(10)));

        let bumped = generator.generate_mutated(476).unwrap();
        assert_eq!(bumped.get("value"), Some(&FixtureValue::Int32(4771)));
        let edge = generator.generate_mutated(525).unwrap();
        assert_eq!(edge.get("value"), Some(&FixtureValue::Int32(5260)));
    }

    #[test]
    fn test_pii_and_null_count() {
        let registry = parity_registry().unwrap();

        let pii = registry.require("fails_pii").unwrap();
        let row = RowGenerator::new(pii).generate_mutated(4).unwrap();
        assert_eq!(row.get("name"), Some(&FixtureValue::string("John")));
        assert_eq!(row.get("sometimes_null"), Some(&FixtureValue::Null));

        let nulls = registry.require("fails_null_count").unwrap();
        let generator = RowGenerator::new(nulls);
        let non_null = (0..9)
            .filter(|&i| !generator.generate_mutated(i).unwrap().get("sometimes_null").unwrap().is_null())
            .count();
        assert_eq!(non_null, 3);
    }
}
