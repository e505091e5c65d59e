//! Bounded-concurrency batch processing.
//!
//! # Architecture
//!
//! ```text
//!   items ──► queue (seeded, then closed)
//!                 │
//!     ┌───────────┼───────────┐
//!     ▼           ▼           ▼
//!  worker 0    worker 1 ... worker n-1      n = min(limit, items)
//!     │           │           │
//!     └───────────┼───────────┘
//!                 ▼
//!         outcome channel ──► coordinator ──► sort by original index
//! ```
//!
//! Workers finish in any order; only the final report is ordered. The outcome channel
//! closes when the last worker exits, so the coordinator never polls.

mod handler;
mod progress;
mod types;
mod workers;


pub use handler::{DocumentHandler, ItemHandler, DEFAULT_MIN_TEXT_CHARS};
pub use progress::{BatchProgress, ProgressTracker};
pub use types::{
    BatchReport, BatchStatus, Classified, FileType, ProcessingOutcome, ProgressUpdate, WorkItem,
};

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::SchedulerError;
use workers::{spawn_workers, SharedReceiver};

/// Default number of items processed at once.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Message recorded on items that were still queued when the batch was cancelled.
pub const CANCELLED_MESSAGE: &str = "Batch cancelled before processing";

/// Runs one batch of work items through a handler with a fixed-size worker pool.
#[derive(Clone)]
pub struct BatchScheduler {
    concurrency_limit: usize,
    progress: ProgressTracker,
    cancel: CancellationToken,
}

impl BatchScheduler {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit,
            progress: ProgressTracker::silent(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Token that stops workers from taking new items.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Process every item and return one outcome per item, ordered by original index.
    ///
    /// Per-item failures are recorded on the outcome. Only problems with the batch itself
    /// return an error.
    pub async fn run<H>(
        &self,
        items: Vec<WorkItem>,
        handler: Arc<H>,
    ) -> Result<BatchReport, SchedulerError>
    where
        H: ItemHandler + 'static,
    {
        if self.concurrency_limit == 0 {
            return Err(SchedulerError::InvalidConcurrency);
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.original_index) {
                return Err(SchedulerError::DuplicateIndex(item.original_index));
            }
        }

        let batch_id = Uuid::new_v4();
        let total = items.len();

        if total == 0 {
            tracing::info!(batch_id = %batch_id, "Nothing submitted");
            return Ok(BatchReport::nothing_submitted(batch_id));
        }

        let worker_count = self.concurrency_limit.min(total);
        tracing::info!(
            batch_id = %batch_id,
            items = total,
            workers = worker_count,
            "Starting batch"
        );

        self.progress.begin(total).await;

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        for item in items {
            // Receiver is alive in this scope
            let _ = queue_tx.send(item);
        }
        drop(queue_tx);
        let queue_rx = SharedReceiver::new_unbounded(queue_rx);

        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        spawn_workers(
            &mut workers,
            worker_count,
            batch_id,
            queue_rx.clone(),
            handler,
            self.progress.clone(),
            outcome_tx,
            self.cancel.clone(),
        );

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = outcome_rx.recv().await {
            outcomes.push(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(batch_id = %batch_id, error = %e, "Worker task failed");
                return Err(SchedulerError::WorkerDied(e.to_string()));
            }
        }

        let mut status = BatchStatus::Completed;
        if self.cancel.is_cancelled() {
            let skipped = queue_rx.drain().await;
            if !skipped.is_empty() {
                status = BatchStatus::Cancelled;
                tracing::info!(batch_id = %batch_id, skipped = skipped.len(), "Batch cancelled");
            }
            for item in skipped {
                let outcome = ProcessingOutcome::failure(&item, CANCELLED_MESSAGE);
                self.progress
                    .apply(ProgressUpdate::Finished {
                        index: item.original_index,
                        failed: true,
                    })
                    .await;
                outcomes.push(outcome);
            }
        }

        if outcomes.len() != total {
            return Err(SchedulerError::OutcomeMismatch {
                expected: total,
                actual: outcomes.len(),
            });
        }

        outcomes.sort_by_key(|o| o.original_index);

        let report = BatchReport {
            batch_id,
            status,
            outcomes,
        };

        tracing::info!(
            batch_id = %batch_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            status = ?report.status,
            "Batch finished"
        );

        Ok(report)
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}
