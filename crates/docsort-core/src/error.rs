use thiserror::Error;

use crate::extract::ExtractionError;

/// Per-item failure. Recorded on the item's outcome, never propagated.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("No text found in document")]
    EmptyContent { chars: usize },

    #[error("Categorization failed: {0}")]
    Categorization(String),
}

/// Conditions that abort a whole batch.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Concurrency limit must be at least 1")]
    InvalidConcurrency,

    #[error("Duplicate original index {0} in batch")]
    DuplicateIndex(usize),

    #[error("Worker task died: {0}")]
    WorkerDied(String),

    #[error("Expected {expected} outcomes, got {actual}")]
    OutcomeMismatch { expected: usize, actual: usize },
}

/// Errors from the batch submission API.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("A batch is already in progress")]
    BatchInProgress,

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
