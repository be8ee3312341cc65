use super::traits::{ReportReader, ReportStore, ReportWriter, StorageError};
use super::with_deadline;
use crate::domain::{DailySummary, GameProfit, Report};
use async_trait::async_trait;
use duckdb::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const BACKEND: &str = "duckdb";

/// Check if a process with the given PID is still running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("ps")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        // On non-Unix systems, assume process is running to be safe
        let _ = pid;
        true
    }
}

/// Extract the PID from a DuckDB lock error message of the form "... (PID 12345) ..."
fn extract_pid_from_lock_error(error_msg: &str) -> Option<u32> {
    let start = error_msg.find("(PID ")? + 5;
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].parse().ok()
}

/// Remove DuckDB WAL and lock files left behind by a dead process
fn remove_lock_files(db_path: &Path) -> std::io::Result<()> {
    for suffix in ["wal", "lock"] {
        let stale = PathBuf::from(format!("{}.{}", db_path.display(), suffix));
        if stale.exists() {
            std::fs::remove_file(&stale)?;
            tracing::info!("Removed stale {} file: {}", suffix, stale.display());
        }
    }
    Ok(())
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, StorageError> {
    conn.lock().map_err(|_| StorageError::Poisoned)
}

/// Embedded columnar store backed by DuckDB.
///
/// The connection is shared behind a mutex and every call runs on the
/// blocking pool.
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    write_timeout: Duration,
    read_timeout: Duration,
}

impl DuckDbStore {
    /// Open (or create) a database file, recovering from a stale lock if the
    /// owning process is gone.
    pub fn open<P: AsRef<Path>>(
        path: P,
        write_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Settings(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }

        let conn = match Connection::open(path) {
            Ok(conn) => conn,
            Err(e) => {
                let error_msg = e.to_string();
                if !error_msg.contains("Could not set lock") {
                    return Err(e.into());
                }

                tracing::warn!("Database lock detected: {}", error_msg);
                let pid = extract_pid_from_lock_error(&error_msg).ok_or(StorageError::DuckDb(e))?;

                if is_process_running(pid) {
                    tracing::error!("Process {} is still running, cannot acquire lock", pid);
                    return Err(StorageError::Settings(format!(
                        "database {} is locked by running process {}",
                        path.display(),
                        pid
                    )));
                }

                tracing::warn!("Process {} is not running, removing stale lock files", pid);
                remove_lock_files(path)
                    .map_err(|io| StorageError::Settings(format!("failed to remove lock files: {}", io)))?;

                tracing::info!("Retrying database connection after removing stale locks");
                Connection::open(path)?
            }
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            write_timeout,
            read_timeout,
        })
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            write_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
        })
    }

    /// Same store with different call timeouts.
    pub fn with_timeouts(mut self, write_timeout: Duration, read_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self.read_timeout = read_timeout;
        self
    }

    /// Run `work` on the blocking pool once the connection lock is held.
    ///
    /// The deadline starts at the call and is checked again after the lock is
    /// taken, so a call that queued too long fails without touching the
    /// database. The returned outcome is always what the closure did.
    async fn blocking<T, F>(&self, after: Duration, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, Deadline) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = self.conn.clone();
        let deadline = Deadline::after(after);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock(&conn)?;
            deadline.check()?;
            work(&mut *conn, deadline)
        })
        .await?
    }

    /// Reads are abandoned once the read timeout passes.
    async fn read<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let after = self.read_timeout;
        with_deadline(BACKEND, after, self.blocking(after, move |conn, _| work(conn))).await
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    after: Duration,
}

impl Deadline {
    fn after(after: Duration) -> Self {
        Self {
            at: Instant::now() + after,
            after,
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        if Instant::now() >= self.at {
            return Err(StorageError::Timeout {
                backend: BACKEND,
                after: self.after,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ReportWriter for DuckDbStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn write_batch(&self, reports: &[Report]) -> Result<(), StorageError> {
        if reports.is_empty() {
            return Ok(());
        }

        let reports = reports.to_vec();
        self.blocking(self.write_timeout, move |conn, deadline| {
            // Dropping the transaction on an early return rolls the batch back
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO reports (username, username_game, currency, winloss, bet, turnover, payout,
                                          bet_time, brand_id, brand_name, game_id, game_name, game_type,
                                          transaction_id, round_id)
                     VALUES (?, ?, ?, ?, ?, ?, ?, epoch_ms(CAST(? AS BIGINT)), ?, ?, ?, ?, ?, ?, ?)",
                )?;

                for r in &reports {
                    deadline.check()?;
                    stmt.execute(duckdb::params![
                        r.username,
                        r.username_game,
                        r.currency,
                        r.winloss,
                        r.bet,
                        r.turnover,
                        r.payout,
                        r.bet_time.timestamp_millis(),
                        r.brand_id,
                        r.brand_name,
                        r.game_id,
                        r.game_name,
                        r.game_type,
                        r.transaction_id,
                        r.round_id,
                    ])?;
                }
            }
            deadline.check()?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReportReader for DuckDbStore {
    async fn count(&self) -> Result<u64, StorageError> {
        self.read(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn profit_by_game(&self) -> Result<Vec<GameProfit>, StorageError> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT game_name, CAST(SUM(winloss) AS BIGINT) AS total_profit
                 FROM reports
                 GROUP BY game_name
                 ORDER BY total_profit DESC, game_name",
            )?;

            let rows = stmt.query_map([], |row| {
                Ok(GameProfit {
                    game_name: row.get(0)?,
                    total_profit: row.get(1)?,
                })
            })?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    async fn daily_summary(&self) -> Result<Vec<DailySummary>, StorageError> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT strftime(bet_time, '%Y-%m-%d') AS day,
                        brand_id,
                        game_name,
                        CAST(SUM(bet) AS BIGINT),
                        CAST(SUM(turnover) AS BIGINT),
                        AVG(payout),
                        COUNT(*),
                        CAST(SUM(CASE WHEN winloss > 0 THEN winloss ELSE 0 END) AS BIGINT)
                 FROM reports
                 GROUP BY day, brand_id, game_name
                 ORDER BY day, brand_id, game_name",
            )?;

            let rows = stmt.query_map([], |row| {
                let total_count: i64 = row.get(6)?;
                Ok(DailySummary {
                    date: row.get(0)?,
                    brand_id: row.get(1)?,
                    game_name: row.get(2)?,
                    total_bet: row.get(3)?,
                    total_turnover: row.get(4)?,
                    average_payout: row.get(5)?,
                    total_count: total_count.max(0) as u64,
                    positive_win: row.get(7)?,
                })
            })?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row?);
            }
            Ok(results)
        })
        .await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.blocking(self.write_timeout, |conn, _| {
            conn.execute("DELETE FROM reports", [])?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReportStore for DuckDbStore {
    async fn init_schema(&self) -> Result<(), StorageError> {
        self.blocking(self.write_timeout, |conn, _| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS reports (
                    username VARCHAR NOT NULL,
                    username_game VARCHAR NOT NULL,
                    currency VARCHAR NOT NULL,
                    winloss BIGINT NOT NULL,
                    bet BIGINT NOT NULL,
                    turnover BIGINT NOT NULL,
                    payout DOUBLE NOT NULL,
                    bet_time TIMESTAMP NOT NULL,
                    brand_id VARCHAR NOT NULL,
                    brand_name VARCHAR NOT NULL,
                    game_id VARCHAR NOT NULL,
                    game_name VARCHAR NOT NULL,
                    game_type VARCHAR NOT NULL,
                    transaction_id VARCHAR NOT NULL,
                    round_id VARCHAR NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate;

    async fn setup_store() -> DuckDbStore {
        let store = DuckDbStore::in_memory().unwrap();
        store.init_schema().await.unwrap();
        store
    }

    fn report(game: &str, brand: &str, winloss: i64, bet_time: &str) -> Report {
        let mut report = generate(1).remove(0);
        report.game_name = game.to_string();
        report.brand_id = brand.to_string();
        report.winloss = winloss;
        report.bet = 10;
        report.turnover = 20;
        report.payout = 2.0;
        report.bet_time = bet_time.parse().unwrap();
        report
    }

    #[test]
    fn test_extract_pid_from_lock_error() {
        let msg = "IO Error: Could not set lock on file \"x.duckdb\": Conflicting lock is held in /usr/bin/foo (PID 4242) by user me";
        assert_eq!(extract_pid_from_lock_error(msg), Some(4242));
        assert_eq!(extract_pid_from_lock_error("no pid here"), None);
    }

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let store = DuckDbStore::in_memory().unwrap();
        assert!(store.init_schema().await.is_ok());
        assert!(store.init_schema().await.is_ok());
    }

    #[tokio::test]
    async fn test_write_and_count() {
        let store = setup_store().await;
        store.write_batch(&generate(150)).await.unwrap();
        store.write_batch(&generate(50)).await.unwrap();
        store.write_batch(&[]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_profit_by_game_sorted_descending() {
        let store = setup_store().await;
        store
            .write_batch(&[
                report("Game 1", "brand1", 100, "2025-01-01T10:00:00Z"),
                report("Game 1", "brand1", -30, "2025-01-01T11:00:00Z"),
                report("Game 2", "brand1", 500, "2025-01-02T10:00:00Z"),
                report("Game 3", "brand2", -200, "2025-01-02T10:00:00Z"),
            ])
            .await
            .unwrap();

        let profits = store.profit_by_game().await.unwrap();
        assert_eq!(
            profits,
            vec![
                GameProfit {
                    game_name: "Game 2".to_string(),
                    total_profit: 500,
                },
                GameProfit {
                    game_name: "Game 1".to_string(),
                    total_profit: 70,
                },
                GameProfit {
                    game_name: "Game 3".to_string(),
                    total_profit: -200,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_daily_summary_groups_by_day_brand_game() {
        let store = setup_store().await;
        store
            .write_batch(&[
                report("Game 1", "brand1", 100, "2025-01-01T10:00:00Z"),
                report("Game 1", "brand1", -30, "2025-01-01T23:00:00Z"),
                report("Game 1", "brand1", 40, "2025-01-02T00:30:00Z"),
                report("Game 2", "brand0", 5, "2025-01-01T12:00:00Z"),
            ])
            .await
            .unwrap();

        let summary = store.daily_summary().await.unwrap();
        assert_eq!(summary.len(), 3);

        assert_eq!(summary[0].date, "2025-01-01");
        assert_eq!(summary[0].brand_id, "brand0");
        assert_eq!(summary[0].total_count, 1);

        let first_day = &summary[1];
        assert_eq!(first_day.date, "2025-01-01");
        assert_eq!(first_day.game_name, "Game 1");
        assert_eq!(first_day.total_count, 2);
        assert_eq!(first_day.total_bet, 20);
        assert_eq!(first_day.total_turnover, 40);
        assert_eq!(first_day.positive_win, 100);
        assert!((first_day.average_payout - 2.0).abs() < f64::EPSILON);

        assert_eq!(summary[2].date, "2025-01-02");
        assert_eq!(summary[2].positive_win, 40);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = setup_store().await;
        store.write_batch(&generate(10)).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_write_leaves_no_rows() {
        let store = setup_store().await;
        store.write_batch(&generate(100)).await.unwrap();

        let store = store.with_timeouts(Duration::ZERO, Duration::from_secs(30));
        let err = store.write_batch(&generate(5_000)).await.unwrap_err();

        assert!(matches!(err, StorageError::Timeout { backend: "duckdb", .. }), "{:?}", err);
        assert_eq!(store.count().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_write_outcome_matches_stored_rows() {
        let store = setup_store().await;
        store.write_batch(&generate(100)).await.unwrap();

        // Short enough that the batch may or may not finish in time
        let store = store.with_timeouts(Duration::from_millis(5), Duration::from_secs(30));
        let outcome = store.write_batch(&generate(5_000)).await;

        let expected = if outcome.is_ok() { 5_100 } else { 100 };
        assert_eq!(store.count().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("reports.duckdb");

        let store = DuckDbStore::open(&path, Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        store.init_schema().await.unwrap();
        store.write_batch(&generate(3)).await.unwrap();
        drop(store);

        let reopened = DuckDbStore::open(&path, Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 3);
    }
}
