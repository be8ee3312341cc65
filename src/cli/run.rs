use crate::config::{load_or_default, validate_config, BackendsConfig, Config, WorkloadConfig};
use crate::dispatch::{
    partition_from, BackendWriteStats, Dispatcher, FailedBatch, MultiBackendWrite, Progress,
    WriteStats,
};
use crate::generator::generate;
use crate::reporting::{render_write_stats, Comparison};
use crate::storage::{DuckDbStore, MongoStore, PostgresStore, ReportStore, ReportWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("web server error: {0}")]
    WebServer(String),

    #[error("no backend is available; every enabled backend failed to start")]
    NoBackends,
}

/// Command-line overrides applied on top of the loaded config.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub total_reports: Option<u64>,
    pub batch_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub skip_insert: bool,
    pub clear: bool,
}

impl RunOptions {
    pub fn apply(&self, config: &mut Config) {
        if let Some(total) = self.total_reports {
            config.workload.total_reports = total;
        }
        if let Some(size) = self.batch_size {
            config.workload.batch_size = size;
        }
        if let Some(limit) = self.max_concurrency {
            config.workload.max_concurrency = limit;
        }
        config.run.skip_insert |= self.skip_insert;
        config.run.clear_before |= self.clear;
    }
}

/// One backend, viewed both as a write port and as a full store.
#[derive(Clone)]
pub struct Backend {
    pub writer: Arc<dyn ReportWriter>,
    pub store: Arc<dyn ReportStore>,
}

impl Backend {
    pub fn new<S: ReportStore + 'static>(store: S) -> Self {
        let store = Arc::new(store);
        Self {
            writer: store.clone(),
            store,
        }
    }

    pub fn name(&self) -> &'static str {
        self.writer.name()
    }
}

#[derive(Debug)]
pub struct InsertSummary {
    pub batches: usize,
    pub remaining: u64,
    pub stats: Vec<(&'static str, BackendWriteStats)>,
    pub failures: Vec<FailedBatch>,
    pub elapsed: Duration,
}

pub async fn run(
    config_path: Option<PathBuf>,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut config, loaded_from) = load_or_default(config_path.as_deref())?;
    match &loaded_from {
        Some(path) => info!(config_path = %path.display(), "Loaded configuration"),
        None => info!("No config file found, using built-in defaults"),
    }

    options.apply(&mut config);
    validate_config(&config)?;

    let started = Instant::now();
    let candidates = connect_backends(&config.backends).await;
    let backends = prepare_backends(candidates, config.run.clear_before).await?;

    if config.run.skip_insert {
        println!("Skipping insert, querying existing data");
    } else {
        let writers = backends.iter().map(|b| b.writer.clone()).collect();
        let summary = insert_reports(&config.workload, writers).await?;
        print!(
            "{}",
            render_write_stats(&summary.stats, &summary.failures, summary.elapsed)
        );
    }

    let stores: Vec<Arc<dyn ReportStore>> = backends.iter().map(|b| b.store.clone()).collect();
    let comparison = Comparison::collect(&stores).await;
    print!("{}", comparison.render());

    println!("Done. Total time: {:.2} seconds", started.elapsed().as_secs_f64());
    Ok(())
}

/// Connect every enabled backend, skipping those that cannot be reached.
pub async fn connect_backends(config: &BackendsConfig) -> Vec<Backend> {
    let mut backends = Vec::new();

    if config.postgres.enabled {
        let pg = &config.postgres;
        match PostgresStore::connect(&pg.url, pg.write_timeout, pg.read_timeout).await {
            Ok(store) => backends.push(Backend::new(store)),
            Err(e) => error!(backend = "postgres", error = %e, "Failed to connect, skipping backend"),
        }
    }

    if config.mongo.enabled {
        let mongo = &config.mongo;
        match MongoStore::connect(
            &mongo.uri,
            &mongo.database,
            &mongo.collection,
            mongo.write_timeout,
            mongo.read_timeout,
        )
        .await
        {
            Ok(store) => backends.push(Backend::new(store)),
            Err(e) => error!(backend = "mongodb", error = %e, "Failed to connect, skipping backend"),
        }
    }

    if config.duckdb.enabled {
        let duck = &config.duckdb;
        info!(path = %duck.path.display(), "Opening DuckDB database");
        match DuckDbStore::open(&duck.path, duck.write_timeout, duck.read_timeout) {
            Ok(store) => backends.push(Backend::new(store)),
            Err(e) => error!(backend = "duckdb", error = %e, "Failed to open, skipping backend"),
        }
    }

    backends
}

/// Ensure schemas exist and optionally empty every backend.
///
/// A backend that fails either step is dropped from the run; the run only
/// fails when none remain.
pub async fn prepare_backends(candidates: Vec<Backend>, clear: bool) -> Result<Vec<Backend>, RunError> {
    let mut ready = Vec::with_capacity(candidates.len());

    for backend in candidates {
        if let Err(e) = backend.store.init_schema().await {
            error!(backend = backend.name(), error = %e, "Schema initialisation failed, dropping backend");
            continue;
        }

        if clear {
            if let Err(e) = backend.store.clear().await {
                error!(backend = backend.name(), error = %e, "Clearing failed, dropping backend");
                continue;
            }
            info!(backend = backend.name(), "Cleared existing reports");
        }

        ready.push(backend);
    }

    if ready.is_empty() {
        return Err(RunError::NoBackends);
    }

    info!(
        backends = ?ready.iter().map(Backend::name).collect::<Vec<_>>(),
        "Backends ready"
    );
    Ok(ready)
}

/// Generate the workload round by round and write it through one shared dispatcher.
///
/// Rounds are submitted as soon as they are generated; the only wait for
/// workers to finish is the final drain.
pub async fn insert_reports(
    workload: &WorkloadConfig,
    writers: Vec<Arc<dyn ReportWriter>>,
) -> Result<InsertSummary, RunError> {
    let started = Instant::now();
    let total = workload.total_reports;
    let round_size = workload.effective_round_size().max(1) as u64;
    let rounds = total.div_ceil(round_size);

    let progress = Arc::new(Progress::new(total));
    let stats = Arc::new(WriteStats::new());
    let action = Arc::new(MultiBackendWrite::new(writers, progress.clone(), stats.clone()));
    let dispatcher = Dispatcher::new(workload.max_concurrency);

    info!(
        total,
        batch_size = workload.batch_size,
        max_concurrency = dispatcher.capacity(),
        rounds,
        "Starting inserts"
    );

    let mut generated = 0u64;
    let mut next_seq = 0usize;
    let mut round = 0u64;

    while generated < total {
        round += 1;
        let count = round_size.min(total - generated) as usize;
        info!(round, rounds, count, "Generating reports");

        let reports = tokio::task::spawn_blocking(move || generate(count)).await?;
        let batches = partition_from(reports, workload.batch_size, next_seq);
        let batch_count = batches.len();
        generated += count as u64;

        let submitted = dispatcher.submit(batches, Arc::clone(&action)).await;
        next_seq += submitted;
        if submitted < batch_count {
            warn!(round, submitted, batch_count, "Dispatcher stopped accepting batches, ending generation");
            break;
        }
    }

    dispatcher.drain().await;

    let remaining = progress.remaining();
    let elapsed = started.elapsed();
    info!(
        batches = next_seq,
        remaining,
        elapsed_ms = elapsed.as_millis() as u64,
        "All batch inserts finished"
    );

    Ok(InsertSummary {
        batches: next_seq,
        remaining,
        stats: stats.snapshot(),
        failures: stats.failures(),
        elapsed,
    })
}
