//! Population cache gate.
//!
//! Decides from the control table whether a table's stored contents still
//! match its current signature, and records the new signature once a
//! population succeeds. Callers serialize calls per table name.

use crate::store::{CacheRecord, FixtureStore, StoreError};
use fixture_generator::{Signature, TableDefinition};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Outcome of checking a table against the control table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Stored signature matches; nothing to do.
    Fresh,
    /// No record; the table has never been populated.
    Missing,
    /// Record carried another signature and has been deleted.
    Stale { stored: Signature },
    /// More than one record; all of them have been deleted.
    Corrupt { records: usize },
}

impl GateDecision {
    pub fn needs_population(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

/// Signature-keyed gate in front of the population of each table.
pub struct CacheGate {
    store: Arc<dyn FixtureStore>,
    prepared: OnceCell<()>,
}

impl CacheGate {
    pub fn new(store: Arc<dyn FixtureStore>) -> Self {
        Self {
            store,
            prepared: OnceCell::new(),
        }
    }

    /// Create the control table once per gate.
    async fn prepare(&self) -> Result<(), StoreError> {
        self.prepared
            .get_or_try_init(|| async {
                match self.store.ensure_cache_table().await {
                    Err(e) if e.is_schema_race() => {
                        debug!("Control table created concurrently: {}", e);
                        Ok(())
                    }
                    other => other,
                }
            })
            .await
            .map(|_| ())
    }

    /// Check whether `definition` needs (re)population.
    ///
    /// Stale and duplicate records are deleted before returning, so a
    /// population that fails afterwards leaves no record behind.
    pub async fn should_populate(
        &self,
        definition: &TableDefinition,
    ) -> Result<GateDecision, StoreError> {
        self.prepare().await?;

        let name = definition.name();
        let current = definition.signature();
        let records = self.store.read_cache_records(name).await?;

        let decision = match records.as_slice() {
            [] => GateDecision::Missing,
            [record] if &record.signature == current => GateDecision::Fresh,
            [record] => {
                self.store.delete_cache_records(name).await?;
                GateDecision::Stale {
                    stored: record.signature.clone(),
                }
            }
            _ => {
                warn!(
                    "Control table holds {} records for '{}'; discarding all",
                    records.len(),
                    name
                );
                self.store.delete_cache_records(name).await?;
                GateDecision::Corrupt {
                    records: records.len(),
                }
            }
        };

        debug!("Cache gate for '{}' ({}): {:?}", name, current, decision);
        Ok(decision)
    }

    /// Record that `definition` is now populated with its current signature.
    pub async fn commit(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        self.prepare().await?;
        self.store
            .upsert_cache_record(&CacheRecord::for_definition(definition))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryStore, StoreOp};
    use fixture_generator::TableRegistry;

    fn definitions() -> (Arc<TableDefinition>, Arc<TableDefinition>) {
        let mut registry = TableRegistry::new();
        let a = registry.register(TableDefinition::builder("a")).unwrap();
        let b = registry.register(TableDefinition::builder("b")).unwrap();
        (a, b)
    }

    #[tokio::test]
    async fn test_missing_then_fresh() {
        let store = MemoryStore::new();
        let gate = CacheGate::new(Arc::new(store.clone()));
        let (a, _) = definitions();

        assert_eq!(gate.should_populate(&a).await.unwrap(), GateDecision::Missing);
        gate.commit(&a).await.unwrap();
        assert_eq!(gate.should_populate(&a).await.unwrap(), GateDecision::Fresh);
        assert!(!GateDecision::Fresh.needs_population());

        let ensures = store
            .operations()
            .await
            .into_iter()
            .filter(|op| *op == StoreOp::EnsureCacheTable)
            .count();
        assert_eq!(ensures, 1);
    }

    #[tokio::test]
    async fn test_stale_record_is_deleted() {
        let store = MemoryStore::new();
        let gate = CacheGate::new(Arc::new(store.clone()));
        let (a, b) = definitions();

        let mut record = CacheRecord::for_definition(&a);
        record.signature = b.signature().clone();
        store.seed_cache_record(record).await;

        assert_eq!(
            gate.should_populate(&a).await.unwrap(),
            GateDecision::Stale {
                stored: b.signature().clone()
            }
        );
        assert!(store.cache_records("a").await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_records_are_corruption() {
        let store = MemoryStore::new();
        let gate = CacheGate::new(Arc::new(store.clone()));
        let (a, _) = definitions();

        store.seed_cache_record(CacheRecord::for_definition(&a)).await;
        store.seed_cache_record(CacheRecord::for_definition(&a)).await;

        let decision = gate.should_populate(&a).await.unwrap();
        assert_eq!(decision, GateDecision::Corrupt { records: 2 });
        assert!(decision.needs_population());
        assert!(store.cache_records("a").await.is_empty());
    }
}
