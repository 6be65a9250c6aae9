//! In-process store.
//!
//! Backs `--dry-run` and the test suite. Every call is recorded so that
//! callers can assert on the exact DDL and insert traffic, and inserts can
//! be made to fail or to take time.

use crate::store::{CacheRecord, FixtureStore, StoreError, CACHE_TABLE};
use async_trait::async_trait;
use fixture_core::GeneratedRow;
use fixture_generator::TableDefinition;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    EnsureCacheTable,
    CreateTable(String),
    DropTable(String),
    BulkInsert { table: String, rows: usize },
    DeleteCacheRecords(String),
    UpsertCacheRecord(String),
}

impl StoreOp {
    /// Table the call targeted, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::EnsureCacheTable => None,
            Self::CreateTable(t)
            | Self::DropTable(t)
            | Self::DeleteCacheRecords(t)
            | Self::UpsertCacheRecord(t) => Some(t),
            Self::BulkInsert { table, .. } => Some(table),
        }
    }

    pub fn is_ddl(&self) -> bool {
        matches!(self, Self::CreateTable(_) | Self::DropTable(_))
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    cache_table: bool,
    tables: HashMap<String, Vec<GeneratedRow>>,
    cache: Vec<CacheRecord>,
    ops: Vec<StoreOp>,
    failing_inserts: HashSet<String>,
    create_races: HashSet<String>,
    cache_table_race: bool,
}

/// Store that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    insert_delay: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every bulk insert sleep for `delay` before committing.
    pub fn with_insert_delay(mut self, delay: Duration) -> Self {
        self.insert_delay = Some(delay);
        self
    }

    /// Make every bulk insert into `table_name` fail.
    pub async fn fail_inserts_for(&self, table_name: &str) {
        self.state
            .lock()
            .await
            .failing_inserts
            .insert(table_name.to_string());
    }

    /// Let inserts into `table_name` succeed again.
    pub async fn clear_failures(&self) {
        self.state.lock().await.failing_inserts.clear();
    }

    /// Make the next `create_table` for `table_name` behave as if another
    /// session created it first: the table exists afterwards, but the call
    /// reports `AlreadyExists`.
    pub async fn race_next_create(&self, table_name: &str) {
        self.state
            .lock()
            .await
            .create_races
            .insert(table_name.to_string());
    }

    /// Same as [`Self::race_next_create`] for the control table.
    pub async fn race_next_cache_table_create(&self) {
        self.state.lock().await.cache_table_race = true;
    }

    /// Write a control-table record directly, bypassing upsert semantics.
    pub async fn seed_cache_record(&self, record: CacheRecord) {
        let mut state = self.state.lock().await;
        state.cache_table = true;
        state.cache.push(record);
    }

    /// Rows of `table_name` ordered by row index, or `None` if the table
    /// does not exist.
    pub async fn rows(&self, table_name: &str) -> Option<Vec<GeneratedRow>> {
        let state = self.state.lock().await;
        let mut rows = state.tables.get(table_name)?.clone();
        rows.sort_by_key(|r| r.index);
        Some(rows)
    }

    pub async fn row_count(&self, table_name: &str) -> Option<usize> {
        self.state.lock().await.tables.get(table_name).map(Vec::len)
    }

    pub async fn table_exists(&self, table_name: &str) -> bool {
        self.state.lock().await.tables.contains_key(table_name)
    }

    /// Control-table records for `table_name`.
    pub async fn cache_records(&self, table_name: &str) -> Vec<CacheRecord> {
        self.state
            .lock()
            .await
            .cache
            .iter()
            .filter(|r| r.table_name == table_name)
            .cloned()
            .collect()
    }

    /// Every call made so far, in order.
    pub async fn operations(&self) -> Vec<StoreOp> {
        self.state.lock().await.ops.clone()
    }

    /// Calls made against `table_name`.
    pub async fn operations_for(&self, table_name: &str) -> Vec<StoreOp> {
        self.state
            .lock()
            .await
            .ops
            .iter()
            .filter(|op| op.table() == Some(table_name))
            .cloned()
            .collect()
    }

    /// Sizes of the committed insert batches for `table_name`, in call order.
    pub async fn batch_sizes(&self, table_name: &str) -> Vec<usize> {
        self.operations_for(table_name)
            .await
            .into_iter()
            .filter_map(|op| match op {
                StoreOp::BulkInsert { rows, .. } => Some(rows),
                _ => None,
            })
            .collect()
    }

    /// Forget the call log.
    pub async fn clear_operations(&self) {
        self.state.lock().await.ops.clear();
    }

    /// Highest number of bulk inserts observed running at once.
    pub fn max_concurrent_inserts(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FixtureStore for MemoryStore {
    async fn ensure_cache_table(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.cache_table = true;
        state.ops.push(StoreOp::EnsureCacheTable);
        if std::mem::take(&mut state.cache_table_race) {
            return Err(StoreError::AlreadyExists(CACHE_TABLE.to_string()));
        }
        Ok(())
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::CreateTable(definition.name().to_string()));
        if state.create_races.remove(definition.name()) {
            state.tables.insert(definition.name().to_string(), Vec::new());
        }
        if state.tables.contains_key(definition.name()) {
            return Err(StoreError::AlreadyExists(definition.name().to_string()));
        }
        state.tables.insert(definition.name().to_string(), Vec::new());
        debug!("memory: created table '{}'", definition.name());
        Ok(())
    }

    async fn drop_table(&self, table_name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::DropTable(table_name.to_string()));
        match state.tables.remove(table_name) {
            Some(_) => Ok(()),
            None => Err(StoreError::Absent(table_name.to_string())),
        }
    }

    async fn bulk_insert(
        &self,
        definition: &TableDefinition,
        rows: &[GeneratedRow],
    ) -> Result<u64, StoreError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state.failing_inserts.contains(definition.name()) {
            return Err(StoreError::Rejected(format!(
                "insert into '{}' rejected",
                definition.name()
            )));
        }
        let Some(table) = state.tables.get_mut(definition.name()) else {
            return Err(StoreError::Rejected(format!(
                "relation '{}' does not exist",
                definition.name()
            )));
        };
        table.extend_from_slice(rows);
        state.ops.push(StoreOp::BulkInsert {
            table: definition.name().to_string(),
            rows: rows.len(),
        });
        Ok(rows.len() as u64)
    }

    async fn read_cache_records(&self, table_name: &str) -> Result<Vec<CacheRecord>, StoreError> {
        let state = self.state.lock().await;
        if !state.cache_table {
            return Err(StoreError::Rejected(
                "control table does not exist".to_string(),
            ));
        }
        Ok(state
            .cache
            .iter()
            .filter(|r| r.table_name == table_name)
            .cloned()
            .collect())
    }

    async fn delete_cache_records(&self, table_name: &str) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        state.ops.push(StoreOp::DeleteCacheRecords(table_name.to_string()));
        let before = state.cache.len();
        state.cache.retain(|r| r.table_name != table_name);
        Ok((before - state.cache.len()) as u64)
    }

    async fn upsert_cache_record(&self, record: &CacheRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .ops
            .push(StoreOp::UpsertCacheRecord(record.table_name.clone()));
        state.cache.retain(|r| r.table_name != record.table_name);
        state.cache.push(record.clone());
        Ok(())
    }
}
