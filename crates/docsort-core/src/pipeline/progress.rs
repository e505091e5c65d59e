//! Progress tracking for a running batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use super::types::ProgressUpdate;

/// Snapshot of batch progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    /// Items currently being processed, by original index
    pub in_flight: BTreeMap<usize, String>,
    /// Highest number of items ever in flight at once
    pub peak_in_flight: usize,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            pending: total,
            ..Default::default()
        }
    }

    /// Items that have left the in-flight set.
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    pub fn is_active(&self) -> bool {
        self.pending > 0 || !self.in_flight.is_empty()
    }

    /// Names of files currently in flight, ordered by index.
    pub fn in_flight_names(&self) -> Vec<&str> {
        self.in_flight.values().map(String::as_str).collect()
    }
}

/// Tracks progress of the current batch and notifies a listener on each change.
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<RwLock<BatchProgress>>,
    /// Channel to notify listeners of progress changes
    notify_tx: Option<mpsc::Sender<BatchProgress>>,
}

impl ProgressTracker {
    pub fn new() -> (Self, mpsc::Receiver<BatchProgress>) {
        let (notify_tx, notify_rx) = mpsc::channel(256);
        (
            Self {
                state: Arc::new(RwLock::new(BatchProgress::default())),
                notify_tx: Some(notify_tx),
            },
            notify_rx,
        )
    }

    /// Tracker without a listener.
    pub fn silent() -> Self {
        Self {
            state: Arc::new(RwLock::new(BatchProgress::default())),
            notify_tx: None,
        }
    }

    /// Reset for a new batch of `total` items.
    pub async fn begin(&self, total: usize) {
        let mut state = self.state.write().await;
        *state = BatchProgress::new(total);
        self.notify(&state);
    }

    /// Apply a progress update.
    pub async fn apply(&self, update: ProgressUpdate) {
        let mut state = self.state.write().await;

        match update {
            ProgressUpdate::Started { index, file_name } => {
                state.pending = state.pending.saturating_sub(1);
                state.in_flight.insert(index, file_name);
                state.peak_in_flight = state.peak_in_flight.max(state.in_flight.len());
            }
            ProgressUpdate::Finished { index, failed } => {
                if state.in_flight.remove(&index).is_none() {
                    // Never started (drained on cancel)
                    state.pending = state.pending.saturating_sub(1);
                }
                if failed {
                    state.failed += 1;
                } else {
                    state.completed += 1;
                }
            }
        }

        self.notify(&state);
    }

    /// Current progress.
    pub async fn snapshot(&self) -> BatchProgress {
        self.state.read().await.clone()
    }

    fn notify(&self, progress: &BatchProgress) {
        if let Some(tx) = &self.notify_tx {
            let _ = tx.try_send(progress.clone());
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::silent()
    }
}
