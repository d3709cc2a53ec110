//! Fan-out of an item range over a fixed number of concurrent workers.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use conduit_config::shared::DispatchConfig;
use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::concurrency::barrier::CompletionBarrier;
use crate::concurrency::deadline::{Deadline, Expiry};
use crate::coord_error;
use crate::error::{CoordResult, ErrorKind};
use crate::metrics::{
    CONDUIT_DISPATCH_DURATION_SECONDS, CONDUIT_DISPATCHED_ITEMS_TOTAL,
    CONDUIT_WORKER_PANICS_TOTAL, DISPATCH_KIND_LABEL,
};

/// Splits `0..total_items` into `worker_count` contiguous chunks.
///
/// Chunks are `ceil(total_items / worker_count)` long, the last non-empty chunk takes the
/// remainder and any chunk past the end is empty. Every item lands in exactly one chunk.
/// Returns no chunks for zero workers.
pub fn partition(total_items: usize, worker_count: usize) -> Vec<Range<usize>> {
    if worker_count == 0 {
        return Vec::new();
    }

    let chunk_size = total_items.div_ceil(worker_count);

    (0..worker_count)
        .map(|worker| {
            let start = worker.saturating_mul(chunk_size).min(total_items);
            let end = start.saturating_add(chunk_size).min(total_items);
            start..end
        })
        .collect()
}

/// Result of a completed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Number of workers launched.
    pub workers: usize,
    /// Number of items handed to `work_fn`.
    pub processed: usize,
    /// Set when the dispatch deadline fired before every item was processed.
    pub stopped: Option<Expiry>,
}

/// Fans a range of work items out over a fixed number of concurrent workers.
///
/// Each call to [`TaskDispatcher::run`] or [`TaskDispatcher::run_blocking`] partitions the items
/// with [`partition`], launches one worker per chunk and returns once a [`CompletionBarrier`]
/// over all workers is released. The dispatcher keeps no other shared state; workers publish
/// their effects through whatever `work_fn` captures, typically a
/// [`crate::concurrency::aggregator::SharedAggregator`] or a fan-in
/// [`crate::concurrency::fan_in::Producer`].
#[derive(Debug, Clone)]
pub struct TaskDispatcher {
    worker_count: usize,
    deadline: Deadline,
}

impl TaskDispatcher {
    /// Creates a dispatcher with `worker_count` workers and no deadline.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            deadline: Deadline::unbounded(),
        }
    }

    /// Creates a dispatcher from configuration.
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.worker_count)
    }

    /// Stops workers from taking new items once `deadline` fires.
    ///
    /// Items already handed to `work_fn` run to completion.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns the number of workers each dispatch launches.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Runs the async `work_fn` once per item in `0..total_items` on tokio tasks.
    ///
    /// Fails with [`ErrorKind::WorkerPanic`] (aggregated across workers) when any worker
    /// panicked. Panicking workers still release the barrier.
    pub async fn run<F, Fut>(&self, total_items: usize, work_fn: F) -> CoordResult<DispatchSummary>
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(chunks) = self.plan(total_items) else {
            return Ok(self.empty_summary());
        };

        let started = Instant::now();
        let barrier = CompletionBarrier::new();
        let work_fn = Arc::new(work_fn);

        let handles = chunks
            .into_iter()
            .enumerate()
            .map(|(worker_id, chunk)| {
                let token = barrier.token();
                let work_fn = Arc::clone(&work_fn);
                let deadline = self.deadline.clone();

                tokio::spawn(async move {
                    let _token = token;
                    let mut processed = 0;
                    for item in chunk {
                        if deadline.check().is_some() {
                            debug!(worker_id, processed, "worker stopped by deadline");
                            break;
                        }
                        work_fn(item).await;
                        processed += 1;
                    }

                    processed
                })
            })
            .collect();

        barrier.wait().await;

        self.finish("async", total_items, started, handles).await
    }

    /// Runs the synchronous `work_fn` once per item in `0..total_items` on the blocking pool.
    ///
    /// Meant for CPU-bound work such as classifying numbers. Same completion and error
    /// contract as [`TaskDispatcher::run`].
    pub async fn run_blocking<F>(
        &self,
        total_items: usize,
        work_fn: F,
    ) -> CoordResult<DispatchSummary>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let Some(chunks) = self.plan(total_items) else {
            return Ok(self.empty_summary());
        };

        let started = Instant::now();
        let barrier = CompletionBarrier::new();
        let work_fn = Arc::new(work_fn);

        let handles = chunks
            .into_iter()
            .enumerate()
            .map(|(worker_id, chunk)| {
                let token = barrier.token();
                let work_fn = Arc::clone(&work_fn);
                let deadline = self.deadline.clone();

                tokio::task::spawn_blocking(move || {
                    let _token = token;
                    let mut processed = 0;
                    for item in chunk {
                        if deadline.check().is_some() {
                            debug!(worker_id, processed, "worker stopped by deadline");
                            break;
                        }
                        work_fn(item);
                        processed += 1;
                    }

                    processed
                })
            })
            .collect();

        barrier.wait().await;

        self.finish("blocking", total_items, started, handles).await
    }

    fn plan(&self, total_items: usize) -> Option<Vec<Range<usize>>> {
        if self.worker_count == 0 {
            debug!(total_items, "no workers configured, skipping dispatch");
            return None;
        }

        info!(
            total_items,
            worker_count = self.worker_count,
            "dispatching work items"
        );

        Some(partition(total_items, self.worker_count))
    }

    fn empty_summary(&self) -> DispatchSummary {
        DispatchSummary {
            workers: 0,
            processed: 0,
            stopped: None,
        }
    }

    /// Reaps worker handles after the barrier released and builds the summary.
    async fn finish(
        &self,
        kind: &'static str,
        total_items: usize,
        started: Instant,
        handles: Vec<JoinHandle<usize>>,
    ) -> CoordResult<DispatchSummary> {
        let workers = handles.len();
        let mut processed = 0;
        let mut errors = Vec::new();

        for (worker_id, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(count) => processed += count,
                Err(join_err) if join_err.is_panic() => {
                    error!(worker_id, "dispatch worker panicked");
                    counter!(CONDUIT_WORKER_PANICS_TOTAL, DISPATCH_KIND_LABEL => kind).increment(1);
                    errors.push(
                        coord_error!(
                            ErrorKind::WorkerPanic,
                            "Dispatch worker panicked",
                            format!("worker {worker_id}")
                        )
                        .with_source(join_err),
                    );
                }
                Err(join_err) => {
                    errors.push(
                        coord_error!(
                            ErrorKind::WorkerCancelled,
                            "Dispatch worker was cancelled",
                            format!("worker {worker_id}")
                        )
                        .with_source(join_err),
                    );
                }
            }
        }

        counter!(CONDUIT_DISPATCHED_ITEMS_TOTAL, DISPATCH_KIND_LABEL => kind)
            .increment(processed as u64);
        histogram!(CONDUIT_DISPATCH_DURATION_SECONDS, DISPATCH_KIND_LABEL => kind)
            .record(started.elapsed().as_secs_f64());

        if !errors.is_empty() {
            return Err(errors.into());
        }

        let stopped = if processed < total_items {
            self.deadline.check()
        } else {
            None
        };
        if let Some(expiry) = stopped {
            warn!(processed, total_items, %expiry, "dispatch stopped before all items");
        } else {
            info!(
                processed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "dispatch finished"
            );
        }

        Ok(DispatchSummary {
            workers,
            processed,
            stopped,
        })
    }
}
