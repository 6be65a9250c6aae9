//! Explicit table registry.
//!
//! The registry assigns each definition its ordinal position at
//! registration time. Definitions are frozen behind `Arc` once registered.

use crate::definition::{DefinitionError, TableDefinition, TableDefinitionBuilder};
use fixture_core::{FixtureSchema, DEFAULT_ROW_COUNT};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Ordered set of table definitions.
#[derive(Debug, Clone)]
pub struct TableRegistry {
    tables: Vec<Arc<TableDefinition>>,
    by_name: HashMap<String, usize>,
    default_row_count: u64,
}

impl Default for TableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRegistry {
    /// Create an empty registry with the standard default row count.
    pub fn new() -> Self {
        Self::with_default_row_count(DEFAULT_ROW_COUNT)
    }

    /// Create an empty registry whose tables default to `row_count` rows.
    pub fn with_default_row_count(row_count: u64) -> Self {
        Self {
            tables: Vec::new(),
            by_name: HashMap::new(),
            default_row_count: row_count,
        }
    }

    /// Build every table of a definitions file, in file order.
    pub fn from_schema(schema: FixtureSchema) -> Result<Self, DefinitionError> {
        let mut registry = Self::with_default_row_count(schema.default_row_count);
        for spec in schema.tables {
            registry.register(TableDefinitionBuilder::from_spec(spec))?;
        }
        Ok(registry)
    }

    /// Load and build a definitions file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        Self::from_schema(FixtureSchema::from_file(path)?)
    }

    /// Validate `builder` and append it at the next position.
    pub fn register(
        &mut self,
        builder: TableDefinitionBuilder,
    ) -> Result<Arc<TableDefinition>, DefinitionError> {
        if self.by_name.contains_key(builder.name()) {
            return Err(DefinitionError::DuplicateTable(builder.name().to_string()));
        }

        let position = self.tables.len();
        let definition = Arc::new(builder.build(position, self.default_row_count)?);
        debug!(
            "Registered table '{}' at position {} ({} rows, signature {})",
            definition.name(),
            position,
            definition.row_count(),
            definition.signature()
        );

        self.by_name.insert(definition.name().to_string(), position);
        self.tables.push(Arc::clone(&definition));
        Ok(definition)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TableDefinition>> {
        self.by_name.get(name).map(|&i| &self.tables[i])
    }

    /// Get a definition, failing with `UnknownTable` if absent.
    pub fn require(&self, name: &str) -> Result<&Arc<TableDefinition>, DefinitionError> {
        self.get(name)
            .ok_or_else(|| DefinitionError::UnknownTable(name.to_string()))
    }

    /// All definitions in registration order.
    pub fn tables(&self) -> &[Arc<TableDefinition>] {
        &self.tables
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn default_row_count(&self) -> u64 {
        self.default_row_count
    }

    /// Definitions for `names`, in the order given.
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<TableDefinition>>, DefinitionError> {
        names
            .iter()
            .map(|name| self.require(name).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_positions_follow_registration_order() {
        let mut registry = TableRegistry::new();
        let a = registry.register(TableDefinition::builder("a")).unwrap();
        let b = registry.register(TableDefinition::builder("b")).unwrap();

        assert_eq!(a.position(), 0);
        assert_eq!(b.position(), 1);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let mut registry = TableRegistry::new();
        registry.register(TableDefinition::builder("a")).unwrap();
        let err = registry.register(TableDefinition::builder("a")).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateTable(ref name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_select_and_unknown() {
        let mut registry = TableRegistry::with_default_row_count(5);
        registry.register(TableDefinition::builder("a")).unwrap();
        registry.register(TableDefinition::builder("b")).unwrap();

        let selected = registry.select(&["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(selected[0].name(), "b");
        assert_eq!(selected[1].row_count(), 5);

        assert!(matches!(
            registry.select(&["zzz".to_string()]),
            Err(DefinitionError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
default_row_count: 7
tables:
  - name: first
  - name: second
    row_count: 3
    mutations:
      is_true: false
"#,
        )
        .unwrap();

        let registry = TableRegistry::from_file(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.require("first").unwrap().row_count(), 7);
        assert_eq!(registry.require("second").unwrap().row_count(), 3);
        assert_eq!(registry.require("second").unwrap().position(), 1);
    }
}
