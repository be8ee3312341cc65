pub mod engine;
pub mod partition;
pub mod progress;
pub mod writer;

pub use engine::{dispatch, BatchAction, Dispatcher, WorkerState};
pub use partition::{partition, partition_from, Batch};
pub use progress::Progress;
pub use writer::{BackendOutcome, BackendWriteStats, FailedBatch, MultiBackendWrite, WriteStats};
