//! Pipeline orchestration substrate.
//!
//! This module contains:
//! - AtomicQueue: crash-safe file-backed job queues
//! - JobStore: lock-protected per-job record storage
//! - StageWorker: the generic claim-batch-then-drain polling loop
//! - joblog: per-job progress log sink

pub mod joblog;
pub mod queue;
pub mod record;
pub mod worker;

pub use queue::{AtomicQueue, QueueError};
pub use record::{JobStore, RecordError};
pub use worker::{DrainReport, StageHandler, StageWorker, WorkerConfig};
