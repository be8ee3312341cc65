use crate::domain::{DailySummary, GameProfit, Report};
use async_trait::async_trait;
use std::time::Duration;

/// Write side of a backend, used by dispatch workers.
///
/// Must tolerate concurrent calls from many workers; each call carries its
/// own deadline so a hung backend cannot hold a worker forever.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write_batch(&self, reports: &[Report]) -> Result<(), StorageError>;
}

/// Read side of a backend, used only after dispatch.
#[async_trait]
pub trait ReportReader: Send + Sync {
    async fn count(&self) -> Result<u64, StorageError>;

    /// `SUM(winloss)` per game, largest first.
    async fn profit_by_game(&self) -> Result<Vec<GameProfit>, StorageError>;

    /// Totals per (day, brand, game), ordered by those keys.
    async fn daily_summary(&self) -> Result<Vec<DailySummary>, StorageError>;

    /// Remove every stored report.
    async fn clear(&self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ReportStore: ReportWriter + ReportReader {
    async fn init_schema(&self) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("{backend} did not respond within {after:?}")]
    Timeout {
        backend: &'static str,
        after: Duration,
    },

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("connection lock poisoned")]
    Poisoned,

    #[error("invalid value in column '{column}': {reason}")]
    Conversion { column: String, reason: String },

    #[error("invalid connection settings: {0}")]
    Settings(String),
}
