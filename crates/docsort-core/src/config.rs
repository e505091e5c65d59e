use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::categorize::{CategorizeError, Categorizer, CategoryRule};
use crate::extract::{Extractors, PdfExtractor, TesseractExtractor};
use crate::pipeline::{DEFAULT_CONCURRENCY, DEFAULT_MIN_TEXT_CHARS};
use crate::validate::{ValidationLimits, DEFAULT_MAX_FILE_NAME_LENGTH, DEFAULT_MAX_FILE_SIZE};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (~/.local/share/docsort)
    pub data_dir: PathBuf,
    /// Settings file (settings.json in the data directory)
    pub settings_file: PathBuf,
}

impl Config {
    /// Load configuration or use defaults
    pub fn load_or_default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docsort");

        Self {
            settings_file: data_dir.join("settings.json"),
            data_dir,
        }
    }
}

/// User-adjustable settings, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub concurrency_limit: usize,
    pub max_file_size: u64,
    pub max_file_name_length: usize,
    /// Non-whitespace characters required before text is categorized
    pub min_text_chars: usize,
    /// Tesseract language code, e.g. "eng" or "eng+deu"
    pub ocr_language: String,
    pub tesseract_binary: PathBuf,
    pub ocr_timeout_secs: u64,
    /// Extra rules registered on top of the built-in table
    pub custom_rules: Vec<CategoryRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_name_length: DEFAULT_MAX_FILE_NAME_LENGTH,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            ocr_language: "eng".to_string(),
            tesseract_binary: PathBuf::from("tesseract"),
            ocr_timeout_secs: 120,
            custom_rules: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, falling back to defaults if the file is missing or invalid.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::read(path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read settings file")?;
        let settings = serde_json::from_str(&content).context("Failed to parse settings JSON")?;
        Ok(settings)
    }

    /// Write settings as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).context("Failed to write settings file")?;
        Ok(())
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            max_file_size: self.max_file_size,
            max_file_name_length: self.max_file_name_length,
        }
    }

    /// Built-in categorizer plus the custom rules.
    pub fn build_categorizer(&self) -> Result<Categorizer, CategorizeError> {
        let categorizer = Categorizer::new();
        for rule in &self.custom_rules {
            categorizer.register(rule)?;
        }
        Ok(categorizer)
    }

    pub fn build_extractors(&self) -> Extractors {
        let ocr = TesseractExtractor::new(&self.ocr_language)
            .with_binary(&self.tesseract_binary)
            .with_timeout(Duration::from_secs(self.ocr_timeout_secs));
        Extractors::new(Arc::new(PdfExtractor), Arc::new(ocr))
    }
}
