//! Batched INSERT logic for PostgreSQL population.

use chrono::NaiveDateTime;
use fixture_core::{ColumnType, FixtureValue, GeneratedRow};
use fixture_generator::TableDefinition;
use tokio_postgres::types::ToSql;
use tokio_postgres::Transaction;

use super::ddl::quote_ident;

/// PostgreSQL's limit on bind parameters per statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Rows per INSERT statement so that one statement stays under the bind
/// parameter limit.
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).max(1)
}

/// Build a multi-row INSERT for `row_count` rows.
pub fn generate_insert(qualified: &str, definition: &TableDefinition, row_count: usize) -> String {
    let col_count = definition.columns().len();
    let mut placeholders: Vec<String> = Vec::with_capacity(row_count);
    let mut param_idx = 1;

    for _ in 0..row_count {
        let row_placeholders: Vec<String> = (0..col_count)
            .map(|_| {
                let p = format!("${param_idx}");
                param_idx += 1;
                p
            })
            .collect();
        placeholders.push(format!("({})", row_placeholders.join(", ")));
    }

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        qualified,
        definition
            .columns()
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", "),
        placeholders.join(", ")
    )
}

/// Insert `rows` inside `transaction`, splitting into as many statements as
/// the bind parameter limit requires.
pub async fn insert_rows(
    transaction: &Transaction<'_>,
    qualified: &str,
    definition: &TableDefinition,
    rows: &[GeneratedRow],
) -> Result<u64, tokio_postgres::Error> {
    let mut inserted = 0;
    for chunk in rows.chunks(rows_per_statement(definition.columns().len())) {
        let sql = generate_insert(qualified, definition, chunk.len());

        let mut params: Vec<Box<dyn ToSql + Sync + Send>> =
            Vec::with_capacity(chunk.len() * definition.columns().len());
        for row in chunk {
            for column in definition.columns() {
                let value = row.get(&column.name).unwrap_or(&FixtureValue::Null);
                params.push(value_to_boxed(&column.column_type, value));
            }
        }

        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        inserted += transaction.execute(&sql, &param_refs).await?;
    }
    Ok(inserted)
}

/// Convert a coerced value to a boxed `ToSql` trait object.
///
/// Nulls are typed after the column so that the server accepts them for
/// any parameter type.
fn value_to_boxed(column_type: &ColumnType, value: &FixtureValue) -> Box<dyn ToSql + Sync + Send> {
    match value {
        FixtureValue::Null => match column_type {
            ColumnType::Bool => Box::new(None::<bool>),
            ColumnType::Int32 => Box::new(None::<i32>),
            ColumnType::Int64 => Box::new(None::<i64>),
            ColumnType::Float64 => Box::new(None::<f64>),
            ColumnType::VarChar { .. } | ColumnType::Text => Box::new(None::<String>),
            ColumnType::LocalDateTime => Box::new(None::<NaiveDateTime>),
        },
        FixtureValue::Bool(b) => Box::new(*b),
        FixtureValue::Int32(i) => Box::new(*i),
        FixtureValue::Int64(i) => Box::new(*i),
        FixtureValue::Float64(f) => Box::new(*f),
        FixtureValue::String(s) => Box::new(s.clone()),
        FixtureValue::DateTime(dt) => Box::new(*dt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixture_generator::TableRegistry;

    #[test]
    fn test_generate_insert() {
        let mut registry = TableRegistry::new();
        let def = registry.register(TableDefinition::builder("t")).unwrap();
        let sql = generate_insert("\"t\"", &def, 2);

        assert!(sql.starts_with("INSERT INTO \"t\" (\"id\", \"name\", "));
        assert!(sql.contains("($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"));
        assert!(sql.ends_with("($11, $12, $13, $14, $15, $16, $17, $18, $19, $20)"));
    }

    #[test]
    fn test_rows_per_statement() {
        assert_eq!(rows_per_statement(10), 6553);
        assert_eq!(rows_per_statement(0), MAX_BIND_PARAMS);
        assert_eq!(rows_per_statement(100_000), 1);
    }
}
