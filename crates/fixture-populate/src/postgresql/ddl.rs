//! PostgreSQL DDL generation.

use crate::store::CACHE_TABLE;
use fixture_core::{ColumnType, ToDdl};
use fixture_generator::TableDefinition;

/// PostgreSQL DDL generator.
pub struct PostgreSQLDdl;

impl ToDdl for PostgreSQLDdl {
    fn to_ddl(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::Bool => "BOOLEAN".to_string(),
            ColumnType::Int32 => "INTEGER".to_string(),
            ColumnType::Int64 => "BIGINT".to_string(),
            ColumnType::Float64 => "DOUBLE PRECISION".to_string(),
            ColumnType::VarChar { length } => format!("VARCHAR({length})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::LocalDateTime => "TIMESTAMP".to_string(),
        }
    }
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"schema"."name"`, or `"name"` without a schema.
pub fn qualified_name(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(name)),
        None => quote_ident(name),
    }
}

/// Generate CREATE TABLE statement for a fixture table.
pub fn generate_create_table(qualified: &str, definition: &TableDefinition) -> String {
    let ddl = PostgreSQLDdl;
    let mut parts: Vec<String> = definition
        .columns()
        .iter()
        .map(|c| {
            let mut column = format!("{} {}", quote_ident(&c.name), ddl.to_ddl(&c.column_type));
            if !c.nullable {
                column.push_str(" NOT NULL");
            }
            column
        })
        .collect();

    let keys: Vec<String> = definition
        .columns()
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| quote_ident(&c.name))
        .collect();
    if !keys.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }

    format!("CREATE TABLE {qualified} ({})", parts.join(", "))
}

/// Generate DROP TABLE statement.
pub fn generate_drop_table(qualified: &str) -> String {
    format!("DROP TABLE {qualified}")
}

/// Generate CREATE TABLE statement for the control table.
pub fn generate_create_cache_table(schema: Option<&str>) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         id SERIAL PRIMARY KEY, \
         table_name VARCHAR(200) NOT NULL, \
         signature VARCHAR(200) NOT NULL, \
         position INTEGER NOT NULL, \
         populated_at TIMESTAMPTZ NOT NULL)",
        qualified_name(schema, CACHE_TABLE)
    )
}
