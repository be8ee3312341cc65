use super::date_range::DateRange;
use crate::domain::{DailySummary, GameProfit};
use crate::storage::ReportStore;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Outcome of one timed backend query.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub elapsed: Duration,
    pub result: Result<T, String>,
}

impl<T> Timed<T> {
    pub async fn measure<E, F>(call: F) -> Self
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = call.await.map_err(|e| e.to_string());
        Self {
            elapsed: started.elapsed(),
            result,
        }
    }

    pub fn ok(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }
}

/// Query results for one backend.
#[derive(Debug, Clone)]
pub struct BackendReport {
    pub backend: &'static str,
    pub count: Timed<u64>,
    pub profit: Timed<Vec<GameProfit>>,
    pub daily: Timed<Vec<DailySummary>>,
}

impl BackendReport {
    pub async fn collect(store: &dyn ReportStore) -> Self {
        let backend = store.name();

        let count = Timed::measure(store.count()).await;
        log_query(backend, "count", &count);
        let profit = Timed::measure(store.profit_by_game()).await;
        log_query(backend, "profit_by_game", &profit);
        let daily = Timed::measure(store.daily_summary()).await;
        log_query(backend, "daily_summary", &daily);

        Self {
            backend,
            count,
            profit,
            daily,
        }
    }

    pub fn total_profit(&self) -> Option<i64> {
        self.profit
            .ok()
            .map(|rows| rows.iter().map(|row| row.total_profit).sum())
    }
}

fn log_query<T>(backend: &str, query: &str, timed: &Timed<T>) {
    let elapsed_ms = timed.elapsed.as_millis() as u64;
    match &timed.result {
        Ok(_) => info!(backend, query, elapsed_ms, "Query finished"),
        Err(e) => error!(backend, query, elapsed_ms, error = %e, "Query failed"),
    }
}

/// Side-by-side read results across all backends.
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    pub backends: Vec<BackendReport>,
}

impl Comparison {
    /// Query each store in turn; nothing here runs concurrently.
    pub async fn collect(stores: &[Arc<dyn ReportStore>]) -> Self {
        let mut backends = Vec::with_capacity(stores.len());
        for store in stores {
            backends.push(BackendReport::collect(store.as_ref()).await);
        }

        let comparison = Self { backends };
        if !comparison.sums_agree() {
            warn!("Backends disagree on total profit; inserts may have failed on some of them");
        }
        comparison
    }

    /// True when every backend whose profit query succeeded reports the same sum.
    pub fn sums_agree(&self) -> bool {
        let mut sums = self.backends.iter().filter_map(BackendReport::total_profit);
        match sums.next() {
            Some(first) => sums.all(|sum| sum == first),
            None => true,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        section(
            &mut out,
            "Count",
            &self.backends,
            |r| match &r.count.result {
                Ok(count) => format!("Found: {}", count),
                Err(e) => format!("Failed: {}", e),
            },
            |r| r.count.elapsed,
        );

        section(
            &mut out,
            "Simple Aggregation",
            &self.backends,
            |r| match &r.profit.result {
                Ok(rows) => format!("Found: {}, Sum: {}", rows.len(), r.total_profit().unwrap_or(0)),
                Err(e) => format!("Failed: {}", e),
            },
            |r| r.profit.elapsed,
        );

        section(
            &mut out,
            "Complex Aggregation",
            &self.backends,
            |r| match &r.daily.result {
                Ok(rows) => match DateRange::from_summaries(rows) {
                    Ok(range) => format!("Found: {}, Date Range: {}", rows.len(), range),
                    Err(_) => format!("Found: {}", rows.len()),
                },
                Err(e) => format!("Failed: {}", e),
            },
            |r| r.daily.elapsed,
        );

        out
    }
}

fn section(
    out: &mut String,
    title: &str,
    reports: &[BackendReport],
    line: impl Fn(&BackendReport) -> String,
    elapsed: impl Fn(&BackendReport) -> Duration,
) {
    let _ = writeln!(out, "----- {} -----", title);
    for report in reports {
        let _ = writeln!(
            out,
            "[{}] Time: {:.2} seconds, {}",
            report.backend,
            elapsed(report).as_secs_f64(),
            line(report)
        );
    }
    let _ = writeln!(out, "---------------------");
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed<T>(result: Result<T, String>) -> Timed<T> {
        Timed {
            elapsed: Duration::from_millis(1500),
            result,
        }
    }

    fn profit(game: &str, total: i64) -> GameProfit {
        GameProfit {
            game_name: game.to_string(),
            total_profit: total,
        }
    }

    fn report(backend: &'static str, profits: Result<Vec<GameProfit>, String>) -> BackendReport {
        BackendReport {
            backend,
            count: timed(Ok(10)),
            profit: timed(profits),
            daily: timed(Ok(vec![DailySummary {
                date: "2025-01-01".to_string(),
                brand_id: "brand0".to_string(),
                game_name: "Game 0".to_string(),
                total_bet: 1,
                total_turnover: 2,
                average_payout: 3.0,
                total_count: 10,
                positive_win: 4,
            }])),
        }
    }

    #[test]
    fn test_sums_agree_ignores_failed_backends() {
        let comparison = Comparison {
            backends: vec![
                report("postgres", Ok(vec![profit("Game 1", 30), profit("Game 2", -10)])),
                report("mongodb", Err("timeout".to_string())),
                report("duckdb", Ok(vec![profit("Game 2", -10), profit("Game 1", 30)])),
            ],
        };
        assert!(comparison.sums_agree());
    }

    #[test]
    fn test_sums_disagree() {
        let comparison = Comparison {
            backends: vec![
                report("postgres", Ok(vec![profit("Game 1", 30)])),
                report("duckdb", Ok(vec![profit("Game 1", 29)])),
            ],
        };
        assert!(!comparison.sums_agree());
        assert!(Comparison::default().sums_agree());
    }

    #[test]
    fn test_render_sections() {
        let comparison = Comparison {
            backends: vec![
                report("postgres", Ok(vec![profit("Game 1", 30), profit("Game 2", 12)])),
                report("mongodb", Err("connection refused".to_string())),
            ],
        };
        let text = comparison.render();

        assert!(text.contains("----- Count -----"));
        assert!(text.contains("[postgres] Time: 1.50 seconds, Found: 10"));
        assert!(text.contains("----- Simple Aggregation -----"));
        assert!(text.contains("[postgres] Time: 1.50 seconds, Found: 2, Sum: 42"));
        assert!(text.contains("[mongodb] Time: 1.50 seconds, Failed: connection refused"));
        assert!(text.contains("----- Complex Aggregation -----"));
        assert!(text.contains("Found: 1, Date Range: 2025-01-01 to 2025-01-01, Total Days: 1"));
    }

    #[tokio::test]
    async fn test_measure_captures_error_text() {
        let timed: Timed<u64> = Timed::measure(async { Err::<u64, _>("boom") }).await;
        assert_eq!(timed.result, Err("boom".to_string()));
        assert!(timed.ok().is_none());
    }
}
