//! Batch types: work items, outcomes and progress events.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categorize::{Categorization, ERRORS};

/// Kind of document, decides which extractor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Image,
    Pdf,
}

impl FileType {
    /// Map a MIME type to a file type. Only the supported types return `Some`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "application/pdf" => Some(FileType::Pdf),
            "image/jpeg" | "image/jpg" | "image/png" | "image/gif" | "image/bmp"
            | "image/webp" => Some(FileType::Image),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Image => write!(f, "image"),
            FileType::Pdf => write!(f, "pdf"),
        }
    }
}

/// One file queued for extraction and categorization.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Position in the submitted batch
    pub original_index: usize,
    pub file_name: String,
    pub bytes: Bytes,
    pub file_type: FileType,
}

impl WorkItem {
    pub fn new(
        original_index: usize,
        file_name: impl Into<String>,
        bytes: impl Into<Bytes>,
        file_type: FileType,
    ) -> Self {
        Self {
            original_index,
            file_name: file_name.into(),
            bytes: bytes.into(),
            file_type,
        }
    }
}

/// Successful result of processing one item.
#[derive(Debug, Clone)]
pub struct Classified {
    pub text: String,
    pub categorization: Categorization,
}

/// Result record for one work item, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub original_index: usize,
    pub file_name: String,
    pub category: String,
    /// 0-100, always 0 on failure
    pub confidence: f64,
    pub score: u32,
    /// Empty on failure
    pub extracted_text: String,
    pub failed: bool,
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl ProcessingOutcome {
    pub fn success(item: &WorkItem, classified: Classified) -> Self {
        Self {
            original_index: item.original_index,
            file_name: item.file_name.clone(),
            category: classified.categorization.category,
            confidence: classified.categorization.confidence,
            score: classified.categorization.score,
            extracted_text: classified.text,
            failed: false,
            error_message: None,
            processed_at: Utc::now(),
        }
    }

    pub fn failure(item: &WorkItem, message: impl Into<String>) -> Self {
        Self {
            original_index: item.original_index,
            file_name: item.file_name.clone(),
            category: ERRORS.to_string(),
            confidence: 0.0,
            score: 0,
            extracted_text: String::new(),
            failed: true,
            error_message: Some(message.into()),
            processed_at: Utc::now(),
        }
    }
}

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// No items were submitted; no workers ran
    NothingSubmitted,
    /// Every item was processed
    Completed,
    /// Cancelled; items that never started carry a failed outcome
    Cancelled,
}

/// Ordered result of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    /// Sorted by `original_index`
    pub outcomes: Vec<ProcessingOutcome>,
}

impl BatchReport {
    pub fn nothing_submitted(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            status: BatchStatus::NothingSubmitted,
            outcomes: Vec::new(),
        }
    }

    pub fn is_nothing_submitted(&self) -> bool {
        self.status == BatchStatus::NothingSubmitted
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.failed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed).count()
    }
}

/// Progress event from workers.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// Item dequeued and now in flight.
    Started { index: usize, file_name: String },
    /// Item left the in-flight set.
    Finished { index: usize, failed: bool },
}
