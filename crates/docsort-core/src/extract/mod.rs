//! Text extraction adapters.
//!
//! Each file type has one extractor: PDFs are read through their text layer, images are
//! sent to an OCR backend. Both are opaque `bytes -> text` functions to the rest of the
//! crate.

mod ocr;
mod pdf;

pub use ocr::TesseractExtractor;
pub use pdf::{extract_pdf_text, PdfExtractor, PdfText};

#[cfg(test)]
pub(crate) use pdf::tests::create_test_pdf;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::FileType;

/// Errors from extraction backends.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to parse PDF: {0}")]
    InvalidPdf(String),

    #[error("OCR backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts raw file bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// One extractor per supported file type.
#[derive(Clone)]
pub struct Extractors {
    pub pdf: Arc<dyn TextExtractor>,
    pub image: Arc<dyn TextExtractor>,
}

impl Extractors {
    pub fn new(pdf: Arc<dyn TextExtractor>, image: Arc<dyn TextExtractor>) -> Self {
        Self { pdf, image }
    }

    pub fn for_type(&self, file_type: FileType) -> &dyn TextExtractor {
        match file_type {
            FileType::Pdf => self.pdf.as_ref(),
            FileType::Image => self.image.as_ref(),
        }
    }
}

impl Default for Extractors {
    fn default() -> Self {
        Self {
            pdf: Arc::new(PdfExtractor),
            image: Arc::new(TesseractExtractor::default()),
        }
    }
}
