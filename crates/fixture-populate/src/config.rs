//! Population settings.

use std::num::NonZeroUsize;

/// Default number of rows per insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Sizes of the orchestrator's worker pools and batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateSettings {
    /// Rows per insert batch.
    pub batch_size: usize,
    /// Tables populated at once.
    pub table_workers: usize,
    /// Batch inserts running at once, shared by all tables.
    pub batch_workers: usize,
    /// Open store sessions allowed at once.
    pub max_sessions: usize,
}

impl Default for PopulateSettings {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4);
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            table_workers: cpus,
            batch_workers: cpus * 2,
            max_sessions: cpus * 2 + 2,
        }
    }
}

impl PopulateSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size for inserts.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the number of tables populated concurrently.
    pub fn with_table_workers(mut self, workers: usize) -> Self {
        self.table_workers = workers.max(1);
        self
    }

    /// Set the number of concurrent batch inserts.
    ///
    /// Also raises `max_sessions` so that every batch worker can hold a
    /// session while the control table is being touched.
    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers.max(1);
        self.max_sessions = self.max_sessions.max(self.batch_workers + 2);
        self
    }

    /// Set the maximum number of open store sessions.
    pub fn with_max_sessions(mut self, sessions: usize) -> Self {
        self.max_sessions = sessions.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PopulateSettings::default();
        assert_eq!(settings.batch_size, 1000);
        assert_eq!(settings.batch_workers, settings.table_workers * 2);
        assert_eq!(settings.max_sessions, settings.batch_workers + 2);
    }

    #[test]
    fn test_builder_clamps_to_one() {
        let settings = PopulateSettings::new()
            .with_batch_size(0)
            .with_table_workers(0)
            .with_max_sessions(0)
            .with_batch_workers(0);
        assert_eq!(settings.batch_size, 1);
        assert_eq!(settings.table_workers, 1);
        assert_eq!(settings.batch_workers, 1);
        assert_eq!(settings.max_sessions, 3);
    }
}
