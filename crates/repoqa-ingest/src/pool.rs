//! Bounded worker pool with explicit cancellation.
//!
//! One job per batch, at most `workers` in flight, completions consumed in
//! whatever order they finish. Cancellation stops admitting new jobs,
//! abandons in-flight jobs at their next await point (reporting them
//! `Cancelled`), and still awaits every spawned worker task before
//! returning, so teardown is an ordinary control path rather than something
//! only a signal handler can reach. Partially-run jobs leave no visible
//! state behind as long as their writes are atomic, which the cache's
//! rename protocol guarantees.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum BatchOutcome {
    Completed {
        batch_index: usize,
        nodes: usize,
        elapsed: Duration,
    },
    Failed {
        batch_index: usize,
        error: String,
        elapsed: Duration,
    },
    Cancelled {
        batch_index: usize,
    },
}

#[derive(Debug, Default)]
pub struct PoolRun {
    pub outcomes: Vec<BatchOutcome>,
    /// Jobs lost to task panics; always zero in normal operation.
    pub join_failures: usize,
}

impl PoolRun {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Completed { .. }))
            .count()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .outcomes
            .iter()
            .filter_map(|o| match o {
                BatchOutcome::Failed { batch_index, .. } => Some(*batch_index),
                _ => None,
            })
            .collect();
        indices.sort_unstable();
        indices
    }

    pub fn cancelled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Cancelled { .. }))
            .count()
    }
}

pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Sizes the pool to the host's CPU count.
    pub fn with_available_parallelism() -> Self {
        let workers = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs `job` once per entry. Each entry carries the batch index the
    /// outcome is reported under; a failed job never stops the others.
    pub async fn run<B, F, Fut>(
        &self,
        batches: Vec<(usize, B)>,
        cancel: &CancellationToken,
        job: F,
    ) -> PoolRun
    where
        B: Send + 'static,
        F: Fn(B) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = anyhow::Result<usize>> + Send + 'static,
    {
        let mut pending = batches.into_iter().peekable();
        let mut set: JoinSet<BatchOutcome> = JoinSet::new();
        let mut run = PoolRun::default();

        loop {
            while set.len() < self.workers && !cancel.is_cancelled() && pending.peek().is_some() {
                let Some((batch_index, batch)) = pending.next() else {
                    break;
                };
                let job = job.clone();
                let cancel = cancel.clone();
                set.spawn(async move {
                    let started = Instant::now();
                    tokio::select! {
                        () = cancel.cancelled() => BatchOutcome::Cancelled { batch_index },
                        result = job(batch) => match result {
                            Ok(nodes) => BatchOutcome::Completed {
                                batch_index,
                                nodes,
                                elapsed: started.elapsed(),
                            },
                            Err(error) => BatchOutcome::Failed {
                                batch_index,
                                error: format!("{error:#}"),
                                elapsed: started.elapsed(),
                            },
                        },
                    }
                });
            }

            match set.join_next().await {
                Some(Ok(outcome)) => {
                    match &outcome {
                        BatchOutcome::Completed {
                            batch_index,
                            nodes,
                            elapsed,
                        } => {
                            tracing::info!(batch_index, nodes, ?elapsed, "batch parsed");
                        }
                        BatchOutcome::Failed {
                            batch_index,
                            error,
                            elapsed,
                        } => {
                            tracing::error!(batch_index, %error, ?elapsed, "batch failed");
                        }
                        BatchOutcome::Cancelled { batch_index } => {
                            tracing::info!(batch_index, "batch cancelled");
                        }
                    }
                    run.outcomes.push(outcome);
                }
                Some(Err(join_error)) => {
                    tracing::error!(%join_error, "worker task did not finish");
                    run.join_failures += 1;
                }
                // Set is empty; the admit loop above would have refilled it
                // unless we are cancelled or out of work.
                None => break,
            }
        }

        for (batch_index, _) in pending {
            run.outcomes.push(BatchOutcome::Cancelled { batch_index });
        }
        run
    }
}
