pub mod duckdb;
pub mod mongo;
pub mod postgres;
pub mod traits;

pub use self::duckdb::DuckDbStore;
pub use self::mongo::MongoStore;
pub use self::postgres::PostgresStore;
pub use traits::{ReportReader, ReportStore, ReportWriter, StorageError};

use std::future::Future;
use std::time::Duration;

/// Run a backend call under a deadline, mapping expiry to [`StorageError::Timeout`].
pub(crate) async fn with_deadline<T, F>(
    backend: &'static str,
    after: Duration,
    call: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout { backend, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_expires() {
        let result: Result<(), StorageError> = with_deadline("slow", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(StorageError::Timeout { backend: "slow", .. })));
    }

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let result = with_deadline("fast", Duration::from_secs(1), async { Ok(7u64) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
