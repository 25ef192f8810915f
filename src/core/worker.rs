//! Generic polling stage worker.
//!
//! Every stage runs the same loop: wake on a fixed interval, atomically
//! claim every queued job, attempt each one, stamp and forward successes,
//! write failures back to the stage's own queue for the next tick. The loop
//! has no terminal state in normal operation.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::Stage;

use super::queue::{AtomicQueue, QueueError};
use super::record::JobStore;

/// Stage-specific processing, plugged into a [`StageWorker`].
///
/// `process` performs the stage's side effects for one job. It must be
/// idempotent: under at-least-once delivery a job can be re-processed after
/// a crash between processing and forwarding.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Which stage this handler implements.
    fn stage(&self) -> Stage;

    /// Process one job. Any error marks the job failed for this drain cycle.
    async fn process(&self, job_id: &str) -> Result<()>;
}

/// Worker tuning shared by all stages.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Wall-clock period between drain cycles.
    pub poll_interval: Duration,

    /// Consecutive failures after which a job is moved to the stage's
    /// dead-letter queue. `None` retries forever, matching the original
    /// pipeline's behavior.
    pub max_attempts: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

/// Outcome of one drain cycle, mostly useful for tests and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// One stage's polling loop: inbound queue, handler, and hand-off wiring.
pub struct StageWorker {
    stage: Stage,
    handler: Box<dyn StageHandler>,
    queue: AtomicQueue,
    next_queue: Option<AtomicQueue>,
    dead_queue: AtomicQueue,
    store: JobStore,
    config: WorkerConfig,
    /// Consecutive failure count per job, held in memory only; a worker
    /// restart resets the counts.
    attempts: HashMap<String, u32>,
}

impl StageWorker {
    pub fn new(data_dir: &Path, handler: Box<dyn StageHandler>, config: WorkerConfig) -> Self {
        let stage = handler.stage();
        Self {
            stage,
            queue: AtomicQueue::open(stage.queue_path(data_dir)),
            next_queue: stage.next().map(|s| AtomicQueue::open(s.queue_path(data_dir))),
            dead_queue: AtomicQueue::open(stage.dead_queue_path(data_dir)),
            store: JobStore::new(data_dir),
            handler,
            config,
            attempts: HashMap::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run forever: Idle until the next tick, then drain. A queue I/O error
    /// aborts the current tick only; the next tick retries.
    pub async fn run(mut self) -> Result<()> {
        info!(
            stage = %self.stage,
            poll_secs = self.config.poll_interval.as_secs(),
            "worker starting"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.drain_once().await {
                Ok(report) if report.claimed > 0 => {
                    info!(
                        stage = %self.stage,
                        claimed = report.claimed,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        dead_lettered = report.dead_lettered,
                        "drain cycle finished"
                    );
                }
                Ok(_) => {
                    debug!(stage = %self.stage, "nothing queued");
                }
                Err(e) => {
                    warn!(stage = %self.stage, error = %e, "drain cycle aborted, retrying next tick");
                }
            }
        }
    }

    /// Claim and attempt every currently queued job. Public so tests and
    /// one-shot tools can step the worker without the timer.
    pub async fn drain_once(&mut self) -> Result<DrainReport, QueueError> {
        let batch = self.queue.pop_all()?;
        let mut report = DrainReport {
            claimed: batch.len(),
            ..DrainReport::default()
        };

        if batch.is_empty() {
            return Ok(report);
        }

        let mut failures: Vec<String> = Vec::new();

        for job_id in &batch {
            match self.attempt(job_id).await {
                Ok(()) => {
                    report.succeeded += 1;
                    self.attempts.remove(job_id);
                }
                Err(e) => {
                    let chain = format!("{:#}", e);
                    error!(stage = %self.stage, job = %job_id, error = %chain, "job failed");
                    let count = self.attempts.entry(job_id.clone()).or_insert(0);
                    *count += 1;

                    if self.config.max_attempts.is_some_and(|max| *count >= max) {
                        match self.dead_queue.enqueue(job_id) {
                            Ok(()) => {
                                error!(
                                    stage = %self.stage,
                                    job = %job_id,
                                    attempts = *count,
                                    "retry budget exhausted, moved to dead-letter queue"
                                );
                                report.dead_lettered += 1;
                                self.attempts.remove(job_id);
                            }
                            Err(qe) => {
                                // Dead-letter write failed; keep retrying the
                                // job rather than dropping it.
                                warn!(stage = %self.stage, job = %job_id, error = %qe, "dead-letter enqueue failed");
                                report.failed += 1;
                                failures.push(job_id.clone());
                            }
                        }
                    } else {
                        report.failed += 1;
                        failures.push(job_id.clone());
                    }
                }
            }
        }

        if !failures.is_empty() {
            self.queue.replace(&failures)?;
        }

        Ok(report)
    }

    /// Process one job, then stamp, then forward. Stamp-then-enqueue
    /// ordering guarantees a downstream consumer always sees the upstream
    /// timestamp.
    async fn attempt(&self, job_id: &str) -> Result<()> {
        self.handler.process(job_id).await?;
        self.store.stamp(job_id, self.stage)?;
        if let Some(next) = &self.next_queue {
            next.enqueue(job_id)?;
        }
        Ok(())
    }
}
