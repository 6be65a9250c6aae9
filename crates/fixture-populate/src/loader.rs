//! Concurrent batch loader.
//!
//! Rows are pulled from a lazy stream in index order and cut into batches of
//! `batch_size`. Each batch is inserted by its own task, in its own store
//! transaction, once a permit from the shared batch worker pool is free.
//! Waiting for that permit is what bounds the number of rows held in memory.

use crate::error::PopulateError;
use crate::metrics::PopulateMetrics;
use crate::store::FixtureStore;
use fixture_core::GeneratedRow;
use fixture_generator::{GenerationError, TableDefinition};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

struct BatchOutcome {
    rows: u64,
    elapsed: Duration,
}

/// Splits a row stream into batches and inserts them concurrently.
pub struct BatchLoader {
    store: Arc<dyn FixtureStore>,
    batch_size: usize,
    workers: Arc<Semaphore>,
}

impl BatchLoader {
    /// Create a loader sharing the `workers` pool with other loaders.
    pub fn new(store: Arc<dyn FixtureStore>, batch_size: usize, workers: Arc<Semaphore>) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            workers,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Insert every row of `rows` into the table of `definition`.
    ///
    /// On a generation error no further batch is submitted; batches already
    /// running are awaited and the generation error is returned. Otherwise
    /// all batches run to completion and the first insert error observed is
    /// returned.
    pub async fn load<I>(
        &self,
        definition: Arc<TableDefinition>,
        rows: I,
    ) -> Result<PopulateMetrics, PopulateError>
    where
        I: IntoIterator<Item = Result<GeneratedRow, GenerationError>>,
    {
        let start_time = Instant::now();
        let mut metrics = PopulateMetrics::default();
        let mut rows = rows.into_iter();
        let mut tasks: JoinSet<Result<BatchOutcome, PopulateError>> = JoinSet::new();
        let mut buffer: Vec<GeneratedRow> = Vec::with_capacity(self.batch_size);
        let mut batch_number = 0u64;
        let mut generation_failure = None;
        let mut first_error = None;

        loop {
            let gen_start = Instant::now();
            let next = rows.next();
            metrics.generation_duration += gen_start.elapsed();

            match next {
                Some(Ok(row)) => {
                    buffer.push(row);
                    if buffer.len() >= self.batch_size {
                        let batch = std::mem::replace(&mut buffer, Vec::with_capacity(self.batch_size));
                        if let Err(e) = self.submit(&mut tasks, &definition, batch_number, batch).await {
                            first_error.get_or_insert(e);
                            break;
                        }
                        batch_number += 1;
                    }
                }
                Some(Err(e)) => {
                    generation_failure = Some(e);
                    break;
                }
                None => {
                    if !buffer.is_empty() {
                        let batch = std::mem::take(&mut buffer);
                        if let Err(e) = self.submit(&mut tasks, &definition, batch_number, batch).await {
                            first_error.get_or_insert(e);
                        }
                    }
                    break;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    metrics.rows_inserted += outcome.rows;
                    metrics.batch_count += 1;
                    metrics.insert_duration += outcome.elapsed;
                }
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(PopulateError::Task {
                        table: definition.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(e) = generation_failure {
            return Err(e.into());
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        metrics.total_duration = start_time.elapsed();
        Ok(metrics)
    }

    /// Wait for a worker permit, then spawn the insert of `batch`.
    async fn submit(
        &self,
        tasks: &mut JoinSet<Result<BatchOutcome, PopulateError>>,
        definition: &Arc<TableDefinition>,
        batch_number: u64,
        batch: Vec<GeneratedRow>,
    ) -> Result<(), PopulateError> {
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| PopulateError::Task {
                table: definition.name().to_string(),
                message: e.to_string(),
            })?;

        let store = Arc::clone(&self.store);
        let definition = Arc::clone(definition);
        tasks.spawn(async move {
            let _permit = permit;
            let started = Instant::now();
            let first_index = batch.first().map(|r| r.index).unwrap_or_default();

            let rows = store
                .bulk_insert(&definition, &batch)
                .await
                .map_err(|source| PopulateError::Insert {
                    table: definition.name().to_string(),
                    batch: batch_number,
                    first_index,
                    source,
                })?;

            debug!(
                "Batch {} of '{}' complete: {} rows from index {}",
                batch_number,
                definition.name(),
                rows,
                first_index
            );
            Ok(BatchOutcome {
                rows,
                elapsed: started.elapsed(),
            })
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use fixture_generator::{RowStream, TableRegistry};

    async fn setup(row_count: u64) -> (MemoryStore, Arc<TableDefinition>) {
        let mut registry = TableRegistry::new();
        let def = registry
            .register(TableDefinition::builder("t").row_count(row_count))
            .unwrap();
        let store = MemoryStore::new();
        store.create_table(&def).await.unwrap();
        (store, def)
    }

    fn loader(store: &MemoryStore, batch_size: usize, workers: usize) -> BatchLoader {
        BatchLoader::new(
            Arc::new(store.clone()),
            batch_size,
            Arc::new(Semaphore::new(workers)),
        )
    }

    #[tokio::test]
    async fn test_partial_last_batch() {
        let (store, def) = setup(2500).await;
        let metrics = loader(&store, 1000, 4)
            .load(Arc::clone(&def), RowStream::new(Arc::clone(&def)))
            .await
            .unwrap();

        assert_eq!(metrics.rows_inserted, 2500);
        assert_eq!(metrics.batch_count, 3);
        let mut sizes = store.batch_sizes("t").await;
        sizes.sort_unstable();
        assert_eq!(sizes, vec![500, 1000, 1000]);
    }

    #[tokio::test]
    async fn test_empty_stream_inserts_nothing() {
        let (store, def) = setup(0).await;
        let metrics = loader(&store, 10, 1)
            .load(Arc::clone(&def), RowStream::new(Arc::clone(&def)))
            .await
            .unwrap();
        assert_eq!(metrics.batch_count, 0);
        assert!(store.batch_sizes("t").await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_failure_reports_batch() {
        let (store, def) = setup(30).await;
        store.fail_inserts_for("t").await;

        let err = loader(&store, 10, 2)
            .load(Arc::clone(&def), RowStream::new(Arc::clone(&def)))
            .await
            .unwrap_err();
        match err {
            PopulateError::Insert {
                table, first_index, batch, ..
            } => {
                assert_eq!(table, "t");
                assert_eq!(first_index, batch * 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
