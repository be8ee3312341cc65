use crate::dispatch::{BackendWriteStats, FailedBatch};
use std::fmt::Write as _;
use std::time::Duration;

/// Failed batches listed individually before the rest are summarised.
const MAX_LISTED_FAILURES: usize = 10;

pub fn render_write_stats(
    stats: &[(&'static str, BackendWriteStats)],
    failures: &[FailedBatch],
    elapsed: Duration,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "----- Insert -----");
    for (backend, s) in stats {
        let _ = writeln!(
            out,
            "[{}] Batches ok: {}, failed: {}, Records: {}, Mean: {:.1} ms, Max: {:.1} ms",
            backend,
            s.batches_ok,
            s.batches_failed,
            s.records_written,
            s.mean_elapsed().as_secs_f64() * 1000.0,
            s.max_elapsed.as_secs_f64() * 1000.0,
        );
    }

    if !failures.is_empty() {
        let _ = writeln!(out, "Failed batches: {}", failures.len());
        for failure in failures.iter().take(MAX_LISTED_FAILURES) {
            let _ = writeln!(out, "  seq {} on {}: {}", failure.seq, failure.backend, failure.error);
        }
        if failures.len() > MAX_LISTED_FAILURES {
            let _ = writeln!(out, "  ... and {} more", failures.len() - MAX_LISTED_FAILURES);
        }
    }

    let _ = writeln!(out, "All batch inserts took: {:.2} seconds", elapsed.as_secs_f64());
    let _ = writeln!(out, "---------------------");
    let _ = writeln!(out);
    out
}
