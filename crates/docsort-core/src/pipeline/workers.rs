//! Worker pool for one batch.
//!
//! Workers share a single receiver over a channel that was seeded with every item and then
//! closed. Each worker loops dequeue, process, record until the channel is drained or the
//! batch is cancelled.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::handler::ItemHandler;
use super::progress::ProgressTracker;
use super::types::{ProcessingOutcome, ProgressUpdate, WorkItem};
use crate::error::ItemError;

/// Shared receiver that multiple workers can pull from.
pub struct SharedReceiver<T> {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T> SharedReceiver<T> {
    pub fn new_unbounded(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Take whatever is still queued without waiting.
    pub async fn drain(&self) -> Vec<T> {
        let mut rx = self.rx.lock().await;
        let mut rest = Vec::new();
        while let Ok(item) = rx.try_recv() {
            rest.push(item);
        }
        rest
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

/// Spawn `count` workers into `workers`.
///
/// Each finished item is sent on `outcome_tx`. The channel closes once every worker has
/// exited, which is how the coordinator knows the batch is drained.
#[allow(clippy::too_many_arguments)]
pub fn spawn_workers<H>(
    workers: &mut JoinSet<()>,
    count: usize,
    batch_id: Uuid,
    rx: SharedReceiver<WorkItem>,
    handler: Arc<H>,
    progress: ProgressTracker,
    outcome_tx: mpsc::UnboundedSender<ProcessingOutcome>,
    cancel: CancellationToken,
) where
    H: ItemHandler + 'static,
{
    for i in 0..count {
        let rx = rx.clone();
        let handler = handler.clone();
        let progress = progress.clone();
        let outcome_tx = outcome_tx.clone();
        let cancel = cancel.clone();

        workers.spawn(async move {
            tracing::debug!(batch_id = %batch_id, worker = i, "Worker started");

            loop {
                let item = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(batch_id = %batch_id, worker = i, "Worker cancelled");
                        break;
                    }
                    item = rx.recv() => match item {
                        Some(item) => item,
                        None => break,
                    },
                };

                progress
                    .apply(ProgressUpdate::Started {
                        index: item.original_index,
                        file_name: item.file_name.clone(),
                    })
                    .await;

                let outcome = process_item(handler.as_ref(), &item).await;

                progress
                    .apply(ProgressUpdate::Finished {
                        index: outcome.original_index,
                        failed: outcome.failed,
                    })
                    .await;

                if outcome_tx.send(outcome).is_err() {
                    tracing::warn!(batch_id = %batch_id, worker = i, "Outcome receiver dropped");
                    break;
                }
            }

            tracing::debug!(batch_id = %batch_id, worker = i, "Worker stopped");
        });
    }
}

/// Run the handler on one item. Errors and panics become a failed outcome.
async fn process_item<H>(handler: &H, item: &WorkItem) -> ProcessingOutcome
where
    H: ItemHandler + ?Sized,
{
    let result = AssertUnwindSafe(handler.handle(item)).catch_unwind().await;

    match result {
        Ok(Ok(classified)) => {
            tracing::debug!(
                index = item.original_index,
                file = %item.file_name,
                category = %classified.categorization.category,
                confidence = classified.categorization.confidence,
                "Categorized"
            );
            ProcessingOutcome::success(item, classified)
        }
        Ok(Err(e)) => {
            tracing::warn!(
                index = item.original_index,
                file = %item.file_name,
                error = %e,
                "Item failed"
            );
            ProcessingOutcome::failure(item, e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(
                index = item.original_index,
                file = %item.file_name,
                error = %message,
                "Item panicked"
            );
            ProcessingOutcome::failure(item, ItemError::Categorization(message).to_string())
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
