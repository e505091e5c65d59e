//! Tesseract OCR backend.
//!
//! Runs the `tesseract` command-line tool with the image on stdin and reads the
//! recognized text from stdout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ExtractionError, TextExtractor};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Image extractor backed by the Tesseract CLI.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    binary: PathBuf,
    language: String,
    timeout: Duration,
}

impl TesseractExtractor {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: language.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a specific tesseract executable instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    async fn run_tesseract(&self, image: &[u8]) -> Result<String, ExtractionError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExtractionError::BackendNotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.binary.display()
                )),
                _ => ExtractionError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).await?;
            // Dropping stdin closes the pipe so tesseract starts reading
        }

        let output = child.wait_with_output().await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExtractionError::OcrFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

impl Default for TesseractExtractor {
    fn default() -> Self {
        Self::new("eng")
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        match tokio::time::timeout(self.timeout, self.run_tesseract(bytes)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(self.timeout)),
        }
    }
}
