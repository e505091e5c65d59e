//! Pre-batch validation of submitted files.
//!
//! Every check runs on every file so a rejection lists all of its problems at once.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::pipeline::{FileType, WorkItem};

/// 50 MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_FILE_NAME_LENGTH: usize = 255;

/// MIME types accepted for processing.
pub const ALLOWED_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
    "application/pdf",
];

const UNSAFE_EXTENSIONS: &[&str] = &[".exe", ".bat", ".cmd", ".scr", ".com", ".pif"];

/// A file as handed to the batch submission API.
#[derive(Debug, Clone)]
pub struct FileSubmission {
    pub file_name: String,
    pub bytes: Bytes,
    pub declared_mime: String,
}

impl FileSubmission {
    pub fn new(
        file_name: impl Into<String>,
        bytes: impl Into<Bytes>,
        declared_mime: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
            declared_mime: declared_mime.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Ceilings applied during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationLimits {
    pub max_file_size: u64,
    pub max_file_name_length: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_name_length: DEFAULT_MAX_FILE_NAME_LENGTH,
        }
    }
}

/// One problem found with a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    UnsupportedType { mime: String },
    TooLarge { size: u64, limit: u64 },
    NameTooLong { length: usize, limit: usize },
    Empty,
    UnsafeExtension,
    SignatureMismatch { expected: FileType },
    Unreadable { reason: String },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::UnsupportedType { mime } => write!(
                f,
                "Unsupported file type: {}. Allowed types: {}",
                mime,
                ALLOWED_TYPES.join(", ")
            ),
            ValidationIssue::TooLarge { size, limit } => write!(
                f,
                "File too large: {} (max {})",
                format_file_size(*size),
                format_file_size(*limit)
            ),
            ValidationIssue::NameTooLong { length, limit } => write!(
                f,
                "Filename too long: {} characters (max {})",
                length, limit
            ),
            ValidationIssue::Empty => write!(f, "File is empty"),
            ValidationIssue::UnsafeExtension => {
                write!(f, "Potentially unsafe file extension detected")
            }
            ValidationIssue::SignatureMismatch {
                expected: FileType::Pdf,
            } => write!(f, "Invalid PDF file: File header does not match PDF format"),
            ValidationIssue::SignatureMismatch {
                expected: FileType::Image,
            } => write!(
                f,
                "Invalid image file: File header does not match expected image format"
            ),
            ValidationIssue::Unreadable { reason } => {
                write!(f, "Could not read file: {}", reason)
            }
        }
    }
}

/// A submission failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub file_name: String,
    pub issues: Vec<ValidationIssue>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// A submission that did not make it into the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    /// Position in the submission list
    pub submitted_index: usize,
    pub error: ValidationError,
}

/// Check one submission. Returns its file type when it is acceptable.
pub fn validate_submission(
    submission: &FileSubmission,
    limits: &ValidationLimits,
) -> Result<FileType, ValidationError> {
    let mut issues = Vec::new();

    let mime = submission.declared_mime.trim().to_ascii_lowercase();
    let file_type = if ALLOWED_TYPES.contains(&mime.as_str()) {
        FileType::from_mime(&mime)
    } else {
        None
    };
    if file_type.is_none() {
        issues.push(ValidationIssue::UnsupportedType {
            mime: submission.declared_mime.clone(),
        });
    }

    let size = submission.size();
    if size > limits.max_file_size {
        issues.push(ValidationIssue::TooLarge {
            size,
            limit: limits.max_file_size,
        });
    }

    let length = submission.file_name.chars().count();
    if length > limits.max_file_name_length {
        issues.push(ValidationIssue::NameTooLong {
            length,
            limit: limits.max_file_name_length,
        });
    }

    if size == 0 {
        issues.push(ValidationIssue::Empty);
    }

    let lower = submission.file_name.to_lowercase();
    if UNSAFE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        issues.push(ValidationIssue::UnsafeExtension);
    }

    if let Some(expected) = file_type {
        if size > 0 && !signature_matches(&submission.bytes, expected) {
            issues.push(ValidationIssue::SignatureMismatch { expected });
        }
    }

    match file_type {
        Some(file_type) if issues.is_empty() => Ok(file_type),
        _ => Err(ValidationError {
            file_name: submission.file_name.clone(),
            issues,
        }),
    }
}

/// Whether the content sniffs as the declared kind.
pub fn signature_matches(bytes: &[u8], expected: FileType) -> bool {
    match expected {
        FileType::Pdf => infer::get(bytes).is_some_and(|t| t.mime_type() == "application/pdf"),
        FileType::Image => infer::is_image(bytes),
    }
}

/// Split submissions into work items and rejections.
///
/// Accepted files are renumbered `0..k` in submission order.
pub fn partition_submissions(
    submissions: Vec<FileSubmission>,
    limits: &ValidationLimits,
) -> (Vec<WorkItem>, Vec<Rejection>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for (submitted_index, submission) in submissions.into_iter().enumerate() {
        match validate_submission(&submission, limits) {
            Ok(file_type) => {
                let index = accepted.len();
                accepted.push(WorkItem::new(
                    index,
                    submission.file_name,
                    submission.bytes,
                    file_type,
                ));
            }
            Err(error) => {
                tracing::warn!(file = %error.file_name, error = %error, "Rejected file");
                rejected.push(Rejection {
                    submitted_index,
                    error,
                });
            }
        }
    }

    (accepted, rejected)
}

/// Human-readable size, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

/// Replace characters that are unsafe in file names, collapse whitespace runs to `_`, and
/// truncate to [`DEFAULT_MAX_FILE_NAME_LENGTH`] characters.
pub fn sanitize_file_name(file_name: &str) -> String {
    let mut out = String::with_capacity(file_name.len());
    let mut in_whitespace = false;

    for c in file_name.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => out.push('_'),
            _ => out.push(c),
        }
    }

    out.chars().take(DEFAULT_MAX_FILE_NAME_LENGTH).collect()
}
