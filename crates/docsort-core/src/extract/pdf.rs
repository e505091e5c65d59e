use async_trait::async_trait;

use super::{ExtractionError, TextExtractor};

/// Text layer of a PDF.
#[derive(Debug, Clone)]
pub struct PdfText {
    /// Page texts in page order, trimmed and joined by a single space
    pub text: String,
    /// Number of pages in the PDF
    pub page_count: usize,
}

/// Extract the text layer from PDF bytes.
pub fn extract_pdf_text(pdf_bytes: &[u8]) -> Result<PdfText, ExtractionError> {
    let doc = lopdf::Document::load_mem(pdf_bytes)
        .map_err(|e| ExtractionError::InvalidPdf(e.to_string()))?;

    let mut pages: Vec<u32> = doc.get_pages().keys().cloned().collect();
    pages.sort(); // Ensure pages are in order
    let page_count = pages.len();

    let mut page_texts = Vec::with_capacity(page_count);
    for page_num in &pages {
        let page_text = match doc.extract_text(&[*page_num]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(page = page_num, error = %e, "No text layer on page");
                String::new()
            }
        };
        let page_text = page_text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !page_text.is_empty() {
            page_texts.push(page_text);
        }
    }

    let text = page_texts.join(" ");
    tracing::debug!("Extracted {} chars from {} pages", text.len(), page_count);

    Ok(PdfText { text, page_count })
}

/// Reads the PDF text layer on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let bytes = bytes.to_vec();
        let extracted = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
            .await
            .map_err(|e| ExtractionError::TaskFailed(e.to_string()))??;
        Ok(extracted.text)
    }
}
