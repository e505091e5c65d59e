//! docsort core - document text extraction, categorization and batch processing
//!
//! This crate contains:
//! - Weighted-pattern categorization (regex rule tables)
//! - Text extraction adapters (lopdf text layer, Tesseract OCR)
//! - Pre-batch validation with content sniffing (infer)
//! - A bounded-concurrency batch scheduler with progress tracking
//! - Grouping of results by category

pub mod aggregate;
pub mod categorize;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod validate;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

pub use aggregate::{category_stats, group_by_category, CategoryStats};
pub use categorize::{Categorization, CategorizeError, Categorizer, CategoryRule};
pub use config::{Config, Settings};
pub use error::{ItemError, SchedulerError, SortError};
pub use extract::{ExtractionError, Extractors, TextExtractor};
pub use pipeline::{
    BatchProgress, BatchReport, BatchScheduler, BatchStatus, DocumentHandler, FileType,
    ItemHandler, ProcessingOutcome, ProgressTracker, WorkItem,
};
pub use validate::{FileSubmission, Rejection, ValidationError, ValidationIssue};

/// Everything produced by one submission.
#[derive(Debug, Clone)]
pub struct SortResult {
    /// Accepted files, renumbered in submission order
    pub items: Vec<WorkItem>,
    pub rejected: Vec<Rejection>,
    pub report: BatchReport,
    /// Outcomes grouped by category
    pub groups: BTreeMap<String, Vec<ProcessingOutcome>>,
}

/// Batch submission API.
///
/// Owns the categorizer, extractors and settings. Only one batch runs at a time.
pub struct Sorter {
    settings: Settings,
    categorizer: Arc<Categorizer>,
    extractors: Extractors,
    progress: ProgressTracker,
    /// Cancellation token of the running batch
    active: Mutex<Option<CancellationToken>>,
}

impl Sorter {
    /// Build from settings, registering any custom rules.
    pub fn new(settings: Settings) -> Result<Self, CategorizeError> {
        let categorizer = settings.build_categorizer()?;
        let extractors = settings.build_extractors();
        Ok(Self {
            settings,
            categorizer: Arc::new(categorizer),
            extractors,
            progress: ProgressTracker::silent(),
            active: Mutex::new(None),
        })
    }

    pub fn with_extractors(mut self, extractors: Extractors) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn categorizer(&self) -> &Arc<Categorizer> {
        &self.categorizer
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    fn active_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn is_busy(&self) -> bool {
        self.active_slot().is_some()
    }

    /// Stop the running batch from starting new items. Returns false if nothing is running.
    pub async fn cancel(&self) -> bool {
        match self.active_slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Validate, process and group one batch of submissions.
    pub async fn process(&self, submissions: Vec<FileSubmission>) -> Result<SortResult, SortError> {
        let batch = {
            let mut active = self.active_slot();
            if active.is_some() {
                return Err(SortError::BatchInProgress);
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            ActiveBatch {
                slot: &self.active,
                token,
            }
        };

        self.run_batch(submissions, batch.token.clone()).await
    }

    async fn run_batch(
        &self,
        submissions: Vec<FileSubmission>,
        cancel: CancellationToken,
    ) -> Result<SortResult, SortError> {
        let submitted = submissions.len();
        let (items, rejected) =
            validate::partition_submissions(submissions, &self.settings.validation_limits());

        tracing::info!(
            submitted,
            accepted = items.len(),
            rejected = rejected.len(),
            "Validated submissions"
        );

        let handler = Arc::new(
            DocumentHandler::new(self.extractors.clone(), self.categorizer.clone())
                .with_min_text_chars(self.settings.min_text_chars),
        );
        let scheduler = BatchScheduler::new(self.settings.concurrency_limit)
            .with_progress(self.progress.clone())
            .with_cancellation(cancel);

        let report = scheduler.run(items.clone(), handler).await?;
        let groups = group_by_category(&report.outcomes);

        Ok(SortResult {
            items,
            rejected,
            report,
            groups,
        })
    }
}

/// Holds the `active` slot for one batch and frees it when dropped, including when the
/// `process` future is dropped before it completes.
struct ActiveBatch<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl Drop for ActiveBatch<'_> {
    fn drop(&mut self) {
        // Workers of an abandoned batch must not pick up more items
        self.token.cancel();
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n";

    /// Treats everything after the PNG header as the recognized text.
    struct PlainText {
        delay: Duration,
    }

    #[async_trait]
    impl TextExtractor for PlainText {
        fn name(&self) -> &'static str {
            "plain"
        }

        async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
            tokio::time::sleep(self.delay).await;
            let body = bytes.strip_prefix(PNG_HEADER).unwrap_or(bytes);
            Ok(String::from_utf8_lossy(body).to_string())
        }
    }

    fn sorter(delay: Duration) -> Sorter {
        let plain: Arc<dyn TextExtractor> = Arc::new(PlainText { delay });
        Sorter::new(Settings::default())
            .unwrap()
            .with_extractors(Extractors::new(plain.clone(), plain))
    }

    fn png(name: &str, text: &str) -> FileSubmission {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.extend_from_slice(text.as_bytes());
        FileSubmission::new(name, bytes, "image/png")
    }

    #[tokio::test]
    async fn test_process_validates_and_groups() {
        let sorter = sorter(Duration::ZERO);
        let submissions = vec![
            png("w2.png", "Form W-2 Wage and Tax Statement IRS"),
            FileSubmission::new("notes.txt", b"hello".to_vec(), "text/plain"),
            png("bill.png", "Invoice number 881 amount due"),
            png("blank.png", "   "),
            png("stub.png", "Pay stub: gross pay and net pay"),
        ];

        let result = sorter.process(submissions).await.unwrap();

        assert_eq!(result.items.len(), 4);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].submitted_index, 1);

        let categories: Vec<&str> = result
            .report
            .outcomes
            .iter()
            .map(|o| o.category.as_str())
            .collect();
        assert_eq!(
            categories,
            vec!["Tax Documents", "Invoices", "Errors", "Payroll"]
        );
        assert_eq!(result.report.outcomes[1].file_name, "bill.png");

        assert_eq!(result.groups.len(), 4);
        assert_eq!(result.groups["Errors"][0].file_name, "blank.png");
        assert!(!sorter.is_busy().await);
    }

    #[tokio::test]
    async fn test_everything_rejected_is_nothing_submitted() {
        let sorter = sorter(Duration::ZERO);

        let result = sorter
            .process(vec![FileSubmission::new("a.exe", b"MZ".to_vec(), "application/x-msdownload")])
            .await
            .unwrap();

        assert!(result.report.is_nothing_submitted());
        assert!(result.groups.is_empty());
        assert_eq!(result.rejected.len(), 1);
    }

    #[tokio::test]
    async fn test_one_batch_at_a_time() {
        let sorter = sorter(Duration::from_millis(200));

        let (first, second) = tokio::join!(
            sorter.process(vec![png("a.png", "receipt number 12 paid")]),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                sorter.process(vec![png("b.png", "receipt number 13 paid")]).await
            }
        );

        assert_eq!(first.unwrap().report.outcomes[0].category, "Receipts");
        assert!(matches!(second, Err(SortError::BatchInProgress)));

        // Free again once the first batch is done
        let third = sorter
            .process(vec![png("c.png", "receipt number 14 paid")])
            .await
            .unwrap();
        assert_eq!(third.report.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_dropped_batch_frees_the_sorter() {
        let sorter = sorter(Duration::from_millis(500));

        let first = tokio::time::timeout(
            Duration::from_millis(50),
            sorter.process(vec![png("a.png", "receipt number 12 paid")]),
        )
        .await;

        assert!(first.is_err());
        assert!(!sorter.is_busy().await);
        assert!(!sorter.cancel().await);

        let second = tokio::time::timeout(
            Duration::from_secs(5),
            sorter.process(vec![png("b.png", "invoice number 7 amount due")]),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(second.report.outcomes[0].category, "Invoices");
    }

    #[tokio::test]
    async fn test_cancel_without_batch() {
        let sorter = sorter(Duration::ZERO);

        assert!(!sorter.cancel().await);
    }
}
