//! CLI error types
//!
//! Structured errors that serialize to `{"code": "...", "message": "..."}` for `--json` output.

use serde::Serialize;

/// Errors reported by the `docsort` command
///
/// Each variant serializes with a snake_case `code` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum CliError {
    // Input errors
    NoInput { message: String },

    // Configuration errors
    InvalidRule { message: String },
    InvalidConcurrency { message: String },

    // Operation errors
    BatchFailed { message: String },
    ArchiveFailed { message: String },
    InternalError { message: String },
}

impl CliError {
    pub fn no_input() -> Self {
        Self::NoInput {
            message: "No input files given".to_string(),
        }
    }

    pub fn invalid_rule(message: impl Into<String>) -> Self {
        Self::InvalidRule {
            message: message.into(),
        }
    }

    pub fn invalid_concurrency() -> Self {
        Self::InvalidConcurrency {
            message: "Concurrency must be at least 1".to_string(),
        }
    }

    pub fn batch(message: impl Into<String>) -> Self {
        Self::BatchFailed {
            message: message.into(),
        }
    }

    pub fn archive(message: impl Into<String>) -> Self {
        Self::ArchiveFailed {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoInput { .. }
            | Self::InvalidRule { .. }
            | Self::InvalidConcurrency { .. } => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoInput { message } => write!(f, "{}", message),
            Self::InvalidRule { message } => write!(f, "{}", message),
            Self::InvalidConcurrency { message } => write!(f, "{}", message),
            Self::BatchFailed { message } => write!(f, "{}", message),
            Self::ArchiveFailed { message } => write!(f, "{}", message),
            Self::InternalError { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

/// Settings persistence reports through `anyhow`.
impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

impl From<docsort_core::SortError> for CliError {
    fn from(err: docsort_core::SortError) -> Self {
        Self::batch(err.to_string())
    }
}

impl From<docsort_core::CategorizeError> for CliError {
    fn from(err: docsort_core::CategorizeError) -> Self {
        Self::invalid_rule(err.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

/// Extension trait for converting Results to CliResult
pub trait ResultExt<T> {
    fn archive_err(self) -> CliResult<T>;
    fn internal_err(self) -> CliResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn archive_err(self) -> CliResult<T> {
        self.map_err(|e| CliError::archive(e.to_string()))
    }

    fn internal_err(self) -> CliResult<T> {
        self.map_err(|e| CliError::internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_code() {
        let err = CliError::invalid_rule("Invalid pattern for Receipts: unclosed group");

        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], "invalid_rule");
        assert_eq!(json["message"], "Invalid pattern for Receipts: unclosed group");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_anyhow_becomes_internal() {
        let err: CliError = anyhow::anyhow!("Failed to write settings file").into();

        assert!(matches!(err, CliError::InternalError { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::other("disk full"));

        let err = result.archive_err().unwrap_err();

        assert!(matches!(err, CliError::ArchiveFailed { .. }));
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(err.exit_code(), 1);
    }
}
