//! Relational store abstraction.
//!
//! The population engine only needs a handful of operations from a store:
//! table DDL, transactional bulk inserts, and access to the control table
//! that records which signature each table was last populated with.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fixture_core::GeneratedRow;
use fixture_generator::{Signature, TableDefinition};
use thiserror::Error;

/// Name of the control table holding one cache record per fixture table.
pub const CACHE_TABLE: &str = "constructed_table_cache";

/// Persisted marker of the signature a table was last populated with.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    /// Fixture table name
    pub table_name: String,
    /// Signature the table was populated with
    pub signature: Signature,
    /// Registry position of the table at population time
    pub position: usize,
    /// When the population finished
    pub populated_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Record for `definition`, stamped with the current time.
    pub fn for_definition(definition: &TableDefinition) -> Self {
        Self {
            table_name: definition.name().to_string(),
            signature: definition.signature().clone(),
            position: definition.position(),
            populated_at: Utc::now(),
        }
    }
}

/// Errors reported by a [`FixtureStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// CREATE against an object that already exists.
    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// DROP against an object that does not exist.
    #[error("'{0}' does not exist")]
    Absent(String),

    /// PostgreSQL connection or query error.
    #[error("PostgreSQL error: {0}")]
    PostgreSQL(#[from] tokio_postgres::Error),

    /// Connection setup error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store refused the operation.
    #[error("{0}")]
    Rejected(String),
}

impl StoreError {
    /// DDL issued against an object in the wrong exists/absent state.
    pub fn is_schema_race(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::Absent(_))
    }
}

/// Operations the population engine consumes from a relational store.
///
/// Implementations must be safe to call concurrently; every `bulk_insert`
/// runs in its own session and transaction.
#[async_trait]
pub trait FixtureStore: Send + Sync {
    /// Create the control table if it does not exist.
    async fn ensure_cache_table(&self) -> Result<(), StoreError>;

    /// Create the table described by `definition`.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if it is already there.
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError>;

    /// Drop `table_name`.
    ///
    /// Fails with [`StoreError::Absent`] if there is nothing to drop.
    async fn drop_table(&self, table_name: &str) -> Result<(), StoreError>;

    /// Insert `rows` into the table of `definition` in one transaction.
    ///
    /// Returns the number of rows inserted.
    async fn bulk_insert(
        &self,
        definition: &TableDefinition,
        rows: &[GeneratedRow],
    ) -> Result<u64, StoreError>;

    /// All control-table records for `table_name`.
    async fn read_cache_records(&self, table_name: &str) -> Result<Vec<CacheRecord>, StoreError>;

    /// Delete every control-table record for `table_name`.
    async fn delete_cache_records(&self, table_name: &str) -> Result<u64, StoreError>;

    /// Replace the control-table records for `record.table_name` with
    /// `record`, atomically.
    async fn upsert_cache_record(&self, record: &CacheRecord) -> Result<(), StoreError>;
}
