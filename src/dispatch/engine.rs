use super::partition::Batch;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Default number of batches written at the same time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// Work performed for one batch by one worker.
///
/// Infallible by signature: implementations record their own failures.
#[async_trait]
pub trait BatchAction: Send + Sync + 'static {
    async fn run(&self, batch: Batch);
}

/// Lifecycle of a single batch worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Queued,
    SlotAcquired,
    BackendsInFlight,
    Completed,
}

/// Fans batches out to at most `capacity` concurrent workers.
///
/// A slot is an owned semaphore permit moved into the worker task, and each
/// worker also holds a tracker token. Both are released on drop, so a worker
/// that returns early or panics still gives its slot back.
pub struct Dispatcher {
    slots: Arc<Semaphore>,
    capacity: usize,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(max_concurrency: usize) -> Self {
        let capacity = max_concurrency.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            tracker: TaskTracker::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a worker.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Registered units of work that have not completed yet.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Start a worker for each batch in order, blocking only while every slot is taken.
    ///
    /// Returns the number of batches handed to workers. Does not wait for them
    /// to finish; call [`Dispatcher::drain`] for that.
    pub async fn submit<I, A>(&self, batches: I, action: Arc<A>) -> usize
    where
        I: IntoIterator<Item = Batch>,
        A: BatchAction,
    {
        let mut submitted = 0;

        for batch in batches {
            let token = self.tracker.token();
            debug!(seq = batch.seq, state = ?WorkerState::Queued, "Waiting for dispatch slot");

            let permit = match Arc::clone(&self.slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(seq = batch.seq, error = %e, "Dispatch slot pool closed, stopping submission");
                    break;
                }
            };

            let action = Arc::clone(&action);
            tokio::spawn(async move {
                let _token = token;
                let _permit = permit;
                let seq = batch.seq;
                debug!(seq, state = ?WorkerState::SlotAcquired, "Worker started");

                action.run(batch).await;

                debug!(seq, state = ?WorkerState::Completed, "Worker finished");
            });
            submitted += 1;
        }

        submitted
    }

    /// Wait until every submitted worker has completed.
    ///
    /// The dispatcher accepts new submissions afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

/// Process every batch with `action`, at most `max_concurrency` at a time,
/// and return once all of them have completed.
pub async fn dispatch<I, A>(batches: I, action: Arc<A>, max_concurrency: usize)
where
    I: IntoIterator<Item = Batch>,
    A: BatchAction,
{
    let dispatcher = Dispatcher::new(max_concurrency);
    let submitted = dispatcher.submit(batches, action).await;
    dispatcher.drain().await;
    info!(batches = submitted, "Dispatch complete");
}
