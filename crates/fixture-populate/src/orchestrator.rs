//! Table orchestrator.
//!
//! Owns the registry, the store, the cache gate and both worker pools.
//! Cloning an orchestrator is cheap and every clone shares the same pools
//! and per-table locks.

use crate::config::PopulateSettings;
use crate::error::PopulateError;
use crate::gate::{CacheGate, GateDecision};
use crate::loader::BatchLoader;
use crate::metrics::PopulateMetrics;
use crate::store::{FixtureStore, StoreError};
use fixture_generator::{RowStream, Signature, TableDefinition, TableRegistry};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Result of populating one table.
#[derive(Debug, Clone)]
pub enum PopulateOutcome {
    /// The table was (re)created and filled.
    Populated(PopulateMetrics),
    /// The stored signature matched; nothing was touched.
    Skipped,
}

impl PopulateOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    pub fn metrics(&self) -> Option<&PopulateMetrics> {
        match self {
            Self::Populated(metrics) => Some(metrics),
            Self::Skipped => None,
        }
    }
}

/// Outcome of one table within [`TableOrchestrator::populate_all`].
#[derive(Debug)]
pub struct TableReport {
    pub table: String,
    pub result: Result<PopulateOutcome, PopulateError>,
    pub duration: Duration,
}

/// Per-table outcomes of a [`TableOrchestrator::populate_all`] call, in
/// registry order.
#[derive(Debug, Default)]
pub struct PopulationReport {
    pub tables: Vec<TableReport>,
    pub total_duration: Duration,
}

impl PopulationReport {
    pub fn is_success(&self) -> bool {
        self.tables.iter().all(|t| t.result.is_ok())
    }

    /// Tables whose population failed.
    pub fn failures(&self) -> Vec<&TableReport> {
        self.tables.iter().filter(|t| t.result.is_err()).collect()
    }

    pub fn populated_count(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| matches!(t.result, Ok(PopulateOutcome::Populated(_))))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.tables
            .iter()
            .filter(|t| matches!(t.result, Ok(PopulateOutcome::Skipped)))
            .count()
    }

    /// Report for `table`.
    pub fn get(&self, table: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn rows_inserted(&self) -> u64 {
        self.tables
            .iter()
            .filter_map(|t| t.result.as_ref().ok().and_then(PopulateOutcome::metrics))
            .map(|m| m.rows_inserted)
            .sum()
    }
}

/// Runs signature-gated population across the tables of a registry.
#[derive(Clone)]
pub struct TableOrchestrator {
    registry: Arc<TableRegistry>,
    store: Arc<dyn FixtureStore>,
    gate: Arc<CacheGate>,
    loader: Arc<BatchLoader>,
    table_workers: Arc<Semaphore>,
    locks: Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl TableOrchestrator {
    /// Create an orchestrator with pools sized by `settings`.
    pub fn new(
        registry: TableRegistry,
        store: Arc<dyn FixtureStore>,
        settings: &PopulateSettings,
    ) -> Self {
        let locks = registry
            .names()
            .into_iter()
            .map(|name| (name.to_string(), Arc::new(Mutex::new(()))))
            .collect();

        Self {
            registry: Arc::new(registry),
            gate: Arc::new(CacheGate::new(Arc::clone(&store))),
            loader: Arc::new(BatchLoader::new(
                Arc::clone(&store),
                settings.batch_size,
                Arc::new(Semaphore::new(settings.batch_workers.max(1))),
            )),
            table_workers: Arc::new(Semaphore::new(settings.table_workers.max(1))),
            locks: Arc::new(std::sync::Mutex::new(locks)),
            store,
        }
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Current signature of the registered table `name`.
    pub fn signature(&self, name: &str) -> Result<Signature, PopulateError> {
        Ok(self.registry.require(name)?.signature().clone())
    }

    /// Populate the registered table `name` if its signature changed.
    pub async fn populate(&self, name: &str) -> Result<PopulateOutcome, PopulateError> {
        let definition = Arc::clone(self.registry.require(name)?);
        self.populate_definition(&definition).await
    }

    /// Populate `definition` if its signature changed.
    ///
    /// The check, the rebuild and the cache commit run under a lock keyed
    /// by table name, so concurrent calls for one table never interleave.
    pub async fn populate_definition(
        &self,
        definition: &Arc<TableDefinition>,
    ) -> Result<PopulateOutcome, PopulateError> {
        let name = definition.name();
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let decision = self
            .gate
            .should_populate(definition)
            .await
            .map_err(|e| PopulateError::store(name, e))?;

        match &decision {
            GateDecision::Fresh => {
                info!("... {} already populated ({})", name, definition.signature());
                return Ok(PopulateOutcome::Skipped);
            }
            GateDecision::Stale { stored } => info!(
                "... {} populated with different ({} != {}) signature. Repopulating...",
                name,
                definition.signature(),
                stored
            ),
            GateDecision::Missing | GateDecision::Corrupt { .. } => {
                info!("... {} not populated. Populating...", name)
            }
        }

        self.recreate_table(definition).await?;

        info!(
            "Populating table '{}' with {} rows (batch size: {})",
            name,
            definition.row_count(),
            self.loader.batch_size()
        );
        let rows = RowStream::new(Arc::clone(definition));
        let metrics = match self.loader.load(Arc::clone(definition), rows).await {
            Ok(metrics) => metrics,
            Err(e @ PopulateError::Generation(_)) => {
                warn!("Generation failed for '{}'; dropping partial table", name);
                if let Err(drop_error) = self.drop_table(name).await {
                    warn!("Could not drop partial table '{}': {}", name, drop_error);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.gate
            .commit(definition)
            .await
            .map_err(|e| PopulateError::store(name, e))?;

        info!(
            "Population of '{}' complete: {} rows in {} batches, {:?} ({:.2} rows/sec)",
            name,
            metrics.rows_inserted,
            metrics.batch_count,
            metrics.total_duration,
            metrics.rows_per_second()
        );
        Ok(PopulateOutcome::Populated(metrics))
    }

    /// Populate `names` (every registered table when `None`) concurrently.
    ///
    /// Unknown names fail the whole call before anything runs. Once running,
    /// a failing table never stops its siblings.
    pub async fn populate_all(
        &self,
        names: Option<&[String]>,
    ) -> Result<PopulationReport, PopulateError> {
        let start_time = Instant::now();
        let definitions = match names {
            Some(names) => self.registry.select(names)?,
            None => self.registry.tables().to_vec(),
        };
        info!("Populating {} tables", definitions.len());

        let handles: Vec<_> = definitions
            .into_iter()
            .map(|definition| {
                let this = self.clone();
                let table = definition.name().to_string();
                let handle = tokio::spawn(async move {
                    let started = Instant::now();
                    let result = match Arc::clone(&this.table_workers).acquire_owned().await {
                        Ok(_permit) => this.populate_definition(&definition).await,
                        Err(e) => Err(PopulateError::Task {
                            table: definition.name().to_string(),
                            message: e.to_string(),
                        }),
                    };
                    (result, started.elapsed())
                });
                (table, handle)
            })
            .collect();

        let mut report = PopulationReport::default();
        for (table, handle) in handles {
            let (result, duration) = match handle.await {
                Ok(finished) => finished,
                Err(e) => (
                    Err(PopulateError::Task {
                        table: table.clone(),
                        message: e.to_string(),
                    }),
                    Duration::ZERO,
                ),
            };
            if let Err(e) = &result {
                warn!("Failed to populate '{}': {}", table, e);
            }
            report.tables.push(TableReport {
                table,
                result,
                duration,
            });
        }
        report.total_duration = start_time.elapsed();

        info!(
            "Populated {} tables, skipped {}, failed {} in {:?}",
            report.populated_count(),
            report.skipped_count(),
            report.failures().len(),
            report.total_duration
        );
        Ok(report)
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    async fn recreate_table(&self, definition: &TableDefinition) -> Result<(), PopulateError> {
        self.drop_table(definition.name()).await?;
        match self.store.create_table(definition).await {
            Err(e) if e.is_schema_race() => {
                debug!("Ignoring create race on '{}': {}", definition.name(), e);
                Ok(())
            }
            other => other.map_err(|e| PopulateError::store(definition.name(), e)),
        }
    }

    async fn drop_table(&self, name: &str) -> Result<(), PopulateError> {
        match self.store.drop_table(name).await {
            Err(StoreError::Absent(_)) => {
                debug!("Ignoring drop of absent table '{}'", name);
                Ok(())
            }
            other => other.map_err(|e| PopulateError::store(name, e)),
        }
    }
}
