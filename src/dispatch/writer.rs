use super::engine::{BatchAction, WorkerState};
use super::partition::Batch;
use super::progress::Progress;
use crate::storage::ReportWriter;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Result of writing one batch to one backend.
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    pub backend: &'static str,
    pub elapsed: Duration,
    pub result: Result<(), String>,
}

/// A batch that one backend rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedBatch {
    pub seq: usize,
    pub backend: &'static str,
    pub error: String,
}

/// Accumulated write figures for one backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendWriteStats {
    pub batches_ok: u64,
    pub batches_failed: u64,
    pub records_written: u64,
    pub total_elapsed: Duration,
    pub max_elapsed: Duration,
}

impl BackendWriteStats {
    pub fn mean_elapsed(&self) -> Duration {
        let calls = self.batches_ok + self.batches_failed;
        if calls == 0 {
            return Duration::ZERO;
        }
        self.total_elapsed / calls as u32
    }
}

#[derive(Debug, Default)]
struct StatsInner {
    backends: BTreeMap<&'static str, BackendWriteStats>,
    failures: Vec<FailedBatch>,
}

/// Per-backend write statistics shared by all workers.
#[derive(Debug, Default)]
pub struct WriteStats {
    inner: Mutex<StatsInner>,
}

impl WriteStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut StatsInner) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn record(&self, seq: usize, records: usize, outcome: &BackendOutcome) {
        self.with_inner(|inner| {
            let stats = inner.backends.entry(outcome.backend).or_default();
            stats.total_elapsed += outcome.elapsed;
            stats.max_elapsed = stats.max_elapsed.max(outcome.elapsed);

            match &outcome.result {
                Ok(()) => {
                    stats.batches_ok += 1;
                    stats.records_written += records as u64;
                }
                Err(error) => {
                    stats.batches_failed += 1;
                    inner.failures.push(FailedBatch {
                        seq,
                        backend: outcome.backend,
                        error: error.clone(),
                    });
                }
            }
        })
    }

    /// Stats per backend, ordered by backend name.
    pub fn snapshot(&self) -> Vec<(&'static str, BackendWriteStats)> {
        self.with_inner(|inner| {
            inner
                .backends
                .iter()
                .map(|(name, stats)| (*name, stats.clone()))
                .collect()
        })
    }

    pub fn backend(&self, name: &str) -> Option<BackendWriteStats> {
        self.with_inner(|inner| inner.backends.get(name).cloned())
    }

    /// Failed writes ordered by batch, then backend.
    pub fn failures(&self) -> Vec<FailedBatch> {
        let mut failures = self.with_inner(|inner| inner.failures.clone());
        failures.sort_by(|a, b| a.seq.cmp(&b.seq).then(a.backend.cmp(b.backend)));
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Write a batch to one backend, turning both errors and panics into an outcome.
async fn write_to(writer: &dyn ReportWriter, batch: &Batch) -> BackendOutcome {
    let started = Instant::now();
    let result = match AssertUnwindSafe(writer.write_batch(&batch.reports))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("write panicked: {}", panic_message(payload.as_ref()))),
    };

    BackendOutcome {
        backend: writer.name(),
        elapsed: started.elapsed(),
        result,
    }
}

/// Writes each batch to every backend in turn.
///
/// A failing backend is logged and recorded; the remaining backends still
/// receive the batch, and progress is advanced once all have been attempted.
pub struct MultiBackendWrite {
    writers: Vec<Arc<dyn ReportWriter>>,
    progress: Arc<Progress>,
    stats: Arc<WriteStats>,
}

impl MultiBackendWrite {
    pub fn new(
        writers: Vec<Arc<dyn ReportWriter>>,
        progress: Arc<Progress>,
        stats: Arc<WriteStats>,
    ) -> Self {
        Self {
            writers,
            progress,
            stats,
        }
    }

    pub fn progress(&self) -> &Arc<Progress> {
        &self.progress
    }

    pub fn stats(&self) -> &Arc<WriteStats> {
        &self.stats
    }
}

#[async_trait]
impl BatchAction for MultiBackendWrite {
    async fn run(&self, batch: Batch) {
        let started = Instant::now();
        debug!(seq = batch.seq, state = ?WorkerState::BackendsInFlight, "Writing batch");

        for writer in &self.writers {
            let outcome = write_to(writer.as_ref(), &batch).await;
            let elapsed_ms = outcome.elapsed.as_millis() as u64;

            match &outcome.result {
                Ok(()) => debug!(
                    seq = batch.seq,
                    backend = outcome.backend,
                    records = batch.len(),
                    elapsed_ms,
                    "Batch insert succeeded"
                ),
                Err(e) => error!(
                    seq = batch.seq,
                    backend = outcome.backend,
                    elapsed_ms,
                    error = %e,
                    "Batch insert failed"
                ),
            }

            self.stats.record(batch.seq, batch.len(), &outcome);
        }

        let remaining = self.progress.complete(batch.len() as u64);
        info!(
            seq = batch.seq,
            remaining,
            percent = self.progress.percent_complete(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch write sequence finished"
        );
    }
}
