//! PostgreSQL store.
//!
//! Sessions come from a small pool bounded by `max_sessions`. A session is
//! only ever used by one task at a time; it goes back to the pool after a
//! successful call and is discarded after a failed one.

pub mod ddl;
pub mod insert;

use crate::store::{CacheRecord, FixtureStore, StoreError, CACHE_TABLE};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ddl::{generate_create_cache_table, generate_create_table, generate_drop_table, qualified_name};
use fixture_core::GeneratedRow;
use fixture_generator::{Signature, TableDefinition};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info};

/// Store backed by a PostgreSQL database.
pub struct PostgreSQLStore {
    connection_string: String,
    schema: Option<String>,
    sessions: Arc<Semaphore>,
    idle: Arc<Mutex<Vec<Client>>>,
}

/// A checked-out connection holding one pool permit.
struct Session {
    client: Client,
    idle: Arc<Mutex<Vec<Client>>>,
    _permit: OwnedSemaphorePermit,
}

impl Session {
    /// Return the connection to the pool.
    fn release(self) {
        if self.client.is_closed() {
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(self.client);
        }
    }
}

impl PostgreSQLStore {
    /// Connect to PostgreSQL.
    ///
    /// # Arguments
    ///
    /// * `connection_string` - PostgreSQL connection string (e.g., "host=localhost user=postgres password=postgres dbname=testdb")
    /// * `schema` - Schema to create fixture tables in; the server's search path when `None`
    /// * `max_sessions` - Upper bound on concurrently open sessions
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = PostgreSQLStore::connect(
    ///     "host=localhost user=postgres password=postgres dbname=testdb",
    ///     None,
    ///     10,
    /// ).await?;
    /// ```
    pub async fn connect(
        connection_string: &str,
        schema: Option<String>,
        max_sessions: usize,
    ) -> Result<Self, StoreError> {
        let store = Self {
            connection_string: connection_string.to_string(),
            schema,
            sessions: Arc::new(Semaphore::new(max_sessions.max(1))),
            idle: Arc::new(Mutex::new(Vec::new())),
        };

        // Test connection
        let session = store.session().await?;
        session.client.simple_query("SELECT 1").await?;
        session.release();

        info!(
            "Connected to PostgreSQL (schema: {}, max sessions: {})",
            store.schema.as_deref().unwrap_or("<search_path>"),
            max_sessions.max(1)
        );
        Ok(store)
    }

    fn qualify(&self, name: &str) -> String {
        qualified_name(self.schema.as_deref(), name)
    }

    async fn open_client(&self) -> Result<Client, StoreError> {
        let (client, connection) = tokio_postgres::connect(&self.connection_string, NoTls)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // Spawn the connection task
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(client)
    }

    async fn session(&self) -> Result<Session, StoreError> {
        let permit = Arc::clone(&self.sessions)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Connection("session pool closed".to_string()))?;

        let reused = self
            .idle
            .lock()
            .ok()
            .and_then(|mut idle| idle.pop())
            .filter(|client| !client.is_closed());

        let client = match reused {
            Some(client) => client,
            None => self.open_client().await?,
        };

        Ok(Session {
            client,
            idle: Arc::clone(&self.idle),
            _permit: permit,
        })
    }
}

/// Map DDL errors on objects in the wrong state to schema races.
fn classify(error: tokio_postgres::Error, object: &str) -> StoreError {
    match error.code() {
        Some(code) if *code == SqlState::UNDEFINED_TABLE => StoreError::Absent(object.to_string()),
        Some(code) if *code == SqlState::DUPLICATE_TABLE || *code == SqlState::UNIQUE_VIOLATION => {
            StoreError::AlreadyExists(object.to_string())
        }
        _ => StoreError::PostgreSQL(error),
    }
}

#[async_trait]
impl FixtureStore for PostgreSQLStore {
    async fn ensure_cache_table(&self) -> Result<(), StoreError> {
        let session = self.session().await?;
        let sql = generate_create_cache_table(self.schema.as_deref());
        debug!("DDL: {}", sql);
        session
            .client
            .batch_execute(&sql)
            .await
            .map_err(|e| classify(e, CACHE_TABLE))?;
        session.release();
        Ok(())
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        let session = self.session().await?;
        let sql = generate_create_table(&self.qualify(definition.name()), definition);
        info!("Creating table: {}", definition.name());
        debug!("DDL: {}", sql);
        session
            .client
            .batch_execute(&sql)
            .await
            .map_err(|e| classify(e, definition.name()))?;
        session.release();
        Ok(())
    }

    async fn drop_table(&self, table_name: &str) -> Result<(), StoreError> {
        let session = self.session().await?;
        info!("Dropping table: {}", table_name);
        session
            .client
            .batch_execute(&generate_drop_table(&self.qualify(table_name)))
            .await
            .map_err(|e| classify(e, table_name))?;
        session.release();
        Ok(())
    }

    async fn bulk_insert(
        &self,
        definition: &TableDefinition,
        rows: &[GeneratedRow],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut session = self.session().await?;
        let qualified = self.qualify(definition.name());
        let transaction = session.client.transaction().await?;
        let inserted = insert::insert_rows(&transaction, &qualified, definition, rows).await?;
        transaction.commit().await?;
        session.release();
        Ok(inserted)
    }

    async fn read_cache_records(&self, table_name: &str) -> Result<Vec<CacheRecord>, StoreError> {
        let session = self.session().await?;
        let sql = format!(
            "SELECT table_name, signature, position, populated_at FROM {} WHERE table_name = $1",
            self.qualify(CACHE_TABLE)
        );
        let rows = session.client.query(&sql, &[&table_name]).await?;
        session.release();

        Ok(rows
            .iter()
            .map(|row| {
                let position: i32 = row.get(2);
                let populated_at: DateTime<Utc> = row.get(3);
                CacheRecord {
                    table_name: row.get(0),
                    signature: Signature::from_stored(row.get::<_, String>(1)),
                    position: usize::try_from(position).unwrap_or_default(),
                    populated_at,
                }
            })
            .collect())
    }

    async fn delete_cache_records(&self, table_name: &str) -> Result<u64, StoreError> {
        let session = self.session().await?;
        let sql = format!(
            "DELETE FROM {} WHERE table_name = $1",
            self.qualify(CACHE_TABLE)
        );
        let deleted = session.client.execute(&sql, &[&table_name]).await?;
        session.release();
        Ok(deleted)
    }

    async fn upsert_cache_record(&self, record: &CacheRecord) -> Result<(), StoreError> {
        let position = i32::try_from(record.position)
            .map_err(|_| StoreError::Rejected(format!("position {} too large", record.position)))?;
        let qualified = self.qualify(CACHE_TABLE);

        let mut session = self.session().await?;
        let transaction = session.client.transaction().await?;
        transaction
            .execute(
                &format!("DELETE FROM {qualified} WHERE table_name = $1"),
                &[&record.table_name],
            )
            .await?;
        transaction
            .execute(
                &format!(
                    "INSERT INTO {qualified} (table_name, signature, position, populated_at) \
                     VALUES ($1, $2, $3, $4)"
                ),
                &[
                    &record.table_name,
                    &record.signature.as_str(),
                    &position,
                    &record.populated_at,
                ],
            )
            .await?;
        transaction.commit().await?;
        session.release();
        Ok(())
    }
}
