//! What a worker does with one item: extract text, check it has content, categorize it.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{Classified, WorkItem};
use crate::categorize::Categorizer;
use crate::error::ItemError;
use crate::extract::Extractors;

/// Minimum non-whitespace characters for extracted text to count as content.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 5;

/// Per-item work run by the batch workers.
#[async_trait]
pub trait ItemHandler: Send + Sync {
    async fn handle(&self, item: &WorkItem) -> Result<Classified, ItemError>;
}

/// Extracts text with the extractor for the item's type, then categorizes it.
#[derive(Clone)]
pub struct DocumentHandler {
    extractors: Extractors,
    categorizer: Arc<Categorizer>,
    min_text_chars: usize,
}

impl DocumentHandler {
    pub fn new(extractors: Extractors, categorizer: Arc<Categorizer>) -> Self {
        Self {
            extractors,
            categorizer,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }

    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }
}

#[async_trait]
impl ItemHandler for DocumentHandler {
    async fn handle(&self, item: &WorkItem) -> Result<Classified, ItemError> {
        let extractor = self.extractors.for_type(item.file_type);
        tracing::debug!(
            index = item.original_index,
            file = %item.file_name,
            extractor = extractor.name(),
            "Extracting text"
        );

        let raw = extractor.extract_text(&item.bytes).await?;
        let text = raw.trim().to_string();

        let chars = text.chars().filter(|c| !c.is_whitespace()).count();
        if chars < self.min_text_chars {
            return Err(ItemError::EmptyContent { chars });
        }

        let categorization = self.categorizer.categorize(&text);
        Ok(Classified {
            text,
            categorization,
        })
    }
}
