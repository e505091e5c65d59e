pub mod archive;
pub mod error;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::io::AsyncReadExt;

use docsort_core::{
    category_stats, BatchStatus, CategoryStats, Config, FileSubmission, ProcessingOutcome,
    ProgressTracker, Rejection, Settings, Sorter, ValidationError, ValidationIssue,
};

use crate::error::{CliError, CliResult, ResultExt};

/// Initialize tracing/logging with the given directives
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
pub fn init_logging(directives: &[&str]) {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in directives {
        match directive.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive '{}': {}", directive, e),
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Options for one run, filled from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub files: Vec<PathBuf>,
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub no_archive: bool,
    pub json: bool,
    pub settings: Option<PathBuf>,
    pub ocr_lang: Option<String>,
    /// Write the effective settings back to the settings file
    pub save_settings: bool,
}

/// What a run produced, printed as text or JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub batch_id: String,
    pub status: BatchStatus,
    pub outcomes: Vec<ProcessingOutcome>,
    pub rejected: Vec<Rejection>,
    pub stats: BTreeMap<String, CategoryStats>,
    pub archive: Option<PathBuf>,
}

impl Summary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.failed).count()
    }

    /// 0 when at least one file was categorized, 1 when every processed file failed,
    /// 3 when no file made it into the batch.
    pub fn exit_code(&self) -> i32 {
        if self.status == BatchStatus::NothingSubmitted {
            3
        } else if self.succeeded() == 0 {
            1
        } else {
            0
        }
    }
}

/// Run the command and return the process exit code.
pub fn run(options: RunOptions) -> i32 {
    init_logging(&["docsort_lib=info", "docsort_core=warn"]);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    let json = options.json;
    match rt.block_on(sort_files(options)) {
        Ok(summary) => {
            if json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Failed to serialize summary: {}", e);
                        return 1;
                    }
                }
            } else {
                print!("{}", render_summary(&summary));
            }
            summary.exit_code()
        }
        Err(err) => {
            if json {
                if let Ok(out) = serde_json::to_string_pretty(&err) {
                    println!("{}", out);
                }
            }
            eprintln!("error: {}", err);
            err.exit_code()
        }
    }
}

/// Apply command-line overrides to loaded settings.
pub fn apply_overrides(settings: &mut Settings, options: &RunOptions) -> CliResult<()> {
    if let Some(concurrency) = options.concurrency {
        if concurrency == 0 {
            return Err(CliError::invalid_concurrency());
        }
        settings.concurrency_limit = concurrency;
    }
    if let Some(lang) = &options.ocr_lang {
        settings.ocr_language = lang.clone();
    }
    Ok(())
}

/// Files read from disk, and the paths that could not be used.
#[derive(Debug, Default)]
pub struct ReadFiles {
    pub submissions: Vec<FileSubmission>,
    /// Position in the path list of each submission
    pub positions: Vec<usize>,
    pub rejected: Vec<Rejection>,
}

impl ReadFiles {
    /// Merge rejections from the sorter, whose indices count submissions, with the read
    /// failures. The result is indexed by path and sorted.
    fn merge_rejected(&self, sorter_rejected: Vec<Rejection>) -> Vec<Rejection> {
        let mut rejected = self.rejected.clone();
        rejected.extend(sorter_rejected.into_iter().map(|mut rejection| {
            if let Some(&position) = self.positions.get(rejection.submitted_index) {
                rejection.submitted_index = position;
            }
            rejection
        }));
        rejected.sort_by_key(|r| r.submitted_index);
        rejected
    }
}

/// Read files from disk. The MIME type is guessed from the extension.
///
/// A path that cannot be read, or is larger than `max_file_size`, becomes a rejection and
/// the remaining paths are still read. Oversized files are never loaded.
pub async fn read_submissions(paths: &[PathBuf], max_file_size: u64) -> ReadFiles {
    let mut read = ReadFiles::default();
    for (index, path) in paths.iter().enumerate() {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match read_capped(path, max_file_size).await {
            Ok(bytes) => {
                let mime = mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string();
                tracing::debug!(file = %file_name, mime = %mime, size = bytes.len(), "Read file");
                read.submissions.push(FileSubmission::new(file_name, bytes, mime));
                read.positions.push(index);
            }
            Err(issue) => {
                tracing::debug!(path = %path.display(), "Cannot use file: {}", issue);
                read.rejected.push(Rejection {
                    submitted_index: index,
                    error: ValidationError {
                        file_name,
                        issues: vec![issue],
                    },
                });
            }
        }
    }
    read
}

async fn read_capped(path: &Path, max_file_size: u64) -> Result<Vec<u8>, ValidationIssue> {
    let unreadable = |e: std::io::Error| ValidationIssue::Unreadable {
        reason: e.to_string(),
    };
    let too_large = |size: u64| ValidationIssue::TooLarge {
        size,
        limit: max_file_size,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
    if !metadata.is_file() {
        return Err(ValidationIssue::Unreadable {
            reason: "not a regular file".to_string(),
        });
    }
    if metadata.len() > max_file_size {
        return Err(too_large(metadata.len()));
    }

    // The file can grow between the stat and the read
    let file = tokio::fs::File::open(path).await.map_err(unreadable)?;
    let mut bytes = Vec::with_capacity(metadata.len() as usize);
    file.take(max_file_size + 1)
        .read_to_end(&mut bytes)
        .await
        .map_err(unreadable)?;
    if bytes.len() as u64 > max_file_size {
        return Err(too_large(bytes.len() as u64));
    }
    Ok(bytes)
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
    {
        Ok(style) => pb.set_style(style.progress_chars("█▓░")),
        Err(e) => tracing::debug!(error = %e, "Invalid progress template"),
    }
    pb
}

async fn sort_files(options: RunOptions) -> CliResult<Summary> {
    if options.files.is_empty() {
        return Err(CliError::no_input());
    }

    let config = Config::load_or_default();
    let settings_path = options
        .settings
        .clone()
        .unwrap_or_else(|| config.settings_file.clone());
    let mut settings = Settings::load(&settings_path);
    apply_overrides(&mut settings, &options)?;
    if options.save_settings {
        settings.save(&settings_path)?;
        tracing::info!(path = %settings_path.display(), "Saved settings");
    }

    tracing::info!(
        files = options.files.len(),
        concurrency = settings.concurrency_limit,
        ocr_language = %settings.ocr_language,
        "Sorting documents"
    );

    let mut read = read_submissions(&options.files, settings.max_file_size).await;

    let (tracker, mut progress_rx) = ProgressTracker::new();
    let sorter = Arc::new(Sorter::new(settings)?.with_progress(tracker));

    let pb = progress_bar(options.json);
    let bar = pb.clone();
    let progress_task = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            bar.set_length(progress.total as u64);
            bar.set_position(progress.finished() as u64);
            bar.set_message(progress.in_flight_names().join(", "));
        }
    });

    let cancel_sorter = sorter.clone();
    let ctrl_c_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing files in progress");
            cancel_sorter.cancel().await;
        }
    });

    let result = sorter.process(std::mem::take(&mut read.submissions)).await;

    ctrl_c_task.abort();
    progress_task.abort();
    pb.finish_and_clear();

    let result = result?;
    let report = result.report;
    let rejected = read.merge_rejected(result.rejected);

    for rejection in &rejected {
        tracing::warn!(file = %rejection.error.file_name, "Skipped: {}", rejection.error);
    }

    let archive = if options.no_archive {
        None
    } else if report.succeeded() == 0 {
        tracing::warn!("No file was categorized, not writing an archive");
        None
    } else {
        let path = options
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(archive::default_archive_name()));
        let groups = result.groups;
        let items = result.items;
        let target = path.clone();
        tokio::task::spawn_blocking(move || {
            archive::write_archive_file(&target, &groups, &items)
        })
        .await
        .internal_err()?
        .archive_err()?;
        Some(path)
    };

    Ok(Summary {
        batch_id: report.batch_id.to_string(),
        status: report.status,
        stats: category_stats(&report.outcomes),
        outcomes: report.outcomes,
        rejected,
        archive,
    })
}

/// Human-readable summary.
pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();

    for outcome in &summary.outcomes {
        if outcome.failed {
            let _ = writeln!(
                out,
                "  {:<40} {} ({})",
                outcome.file_name,
                outcome.category,
                outcome.error_message.as_deref().unwrap_or("failed")
            );
        } else {
            let _ = writeln!(
                out,
                "  {:<40} {} ({:.0}%)",
                outcome.file_name, outcome.category, outcome.confidence
            );
        }
    }

    for rejection in &summary.rejected {
        let _ = writeln!(
            out,
            "  {:<40} skipped: {}",
            rejection.error.file_name, rejection.error
        );
    }

    let _ = writeln!(out);
    for (category, stats) in &summary.stats {
        let _ = writeln!(
            out,
            "{}: {} file(s), average confidence {:.0}%",
            category, stats.count, stats.average_confidence
        );
    }

    let _ = writeln!(
        out,
        "\nProcessed {} file(s): {} categorized, {} failed, {} skipped",
        summary.outcomes.len(),
        summary.succeeded(),
        summary.outcomes.len() - summary.succeeded(),
        summary.rejected.len()
    );
    if summary.status == BatchStatus::Cancelled {
        let _ = writeln!(out, "Batch was cancelled before all files were processed");
    }
    if let Some(path) = &summary.archive {
        let _ = writeln!(out, "Archive: {}", path.display());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(index: usize, name: &str, category: &str, confidence: f64) -> ProcessingOutcome {
        let failed = category == "Errors";
        ProcessingOutcome {
            original_index: index,
            file_name: name.to_string(),
            category: category.to_string(),
            confidence,
            score: 0,
            extracted_text: String::new(),
            failed,
            error_message: failed.then(|| "No text found in document".to_string()),
            processed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_apply_overrides() {
        let mut settings = Settings::default();
        let options = RunOptions {
            concurrency: Some(4),
            ocr_lang: Some("fra".to_string()),
            ..Default::default()
        };

        apply_overrides(&mut settings, &options).unwrap();

        assert_eq!(settings.concurrency_limit, 4);
        assert_eq!(settings.ocr_language, "fra");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut settings = Settings::default();
        let options = RunOptions {
            concurrency: Some(0),
            ..Default::default()
        };

        let err = apply_overrides(&mut settings, &options).unwrap_err();

        assert!(matches!(err, CliError::InvalidConcurrency { .. }));
        assert_eq!(settings.concurrency_limit, 10);
    }

    /// Options that read and write nothing outside `dir`.
    fn options_in(dir: &Path, files: Vec<PathBuf>) -> RunOptions {
        RunOptions {
            files,
            output: Some(dir.join("out.zip")),
            settings: Some(dir.join("settings.json")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_read_submissions_guesses_mime() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pdf = temp_dir.path().join("statement.pdf");
        let jpg = temp_dir.path().join("receipt.JPG");
        let unknown = temp_dir.path().join("notes.xyz123");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        std::fs::write(&jpg, b"\xff\xd8\xff\xe0").unwrap();
        std::fs::write(&unknown, b"?").unwrap();

        let read = read_submissions(&[pdf, jpg, unknown], 1024).await;
        let submissions = read.submissions;

        assert_eq!(submissions[0].file_name, "statement.pdf");
        assert_eq!(submissions[0].declared_mime, "application/pdf");
        assert_eq!(submissions[1].declared_mime, "image/jpeg");
        assert_eq!(submissions[2].declared_mime, "application/octet-stream");
        assert_eq!(&submissions[0].bytes[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_unreadable_and_oversized_files_are_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ok = temp_dir.path().join("ok.pdf");
        let big = temp_dir.path().join("big.pdf");
        std::fs::write(&ok, b"%PDF-1.4").unwrap();
        std::fs::write(&big, vec![b'x'; 64]).unwrap();
        let paths = vec![
            temp_dir.path().join("missing.pdf"),
            ok,
            big,
            temp_dir.path().to_path_buf(),
        ];

        let read = read_submissions(&paths, 32).await;

        assert_eq!(read.submissions.len(), 1);
        assert_eq!(read.submissions[0].file_name, "ok.pdf");
        assert_eq!(read.positions, vec![1]);

        let indices: Vec<usize> = read.rejected.iter().map(|r| r.submitted_index).collect();
        assert_eq!(indices, vec![0, 2, 3]);
        assert_eq!(read.rejected[0].error.file_name, "missing.pdf");
        assert!(matches!(
            read.rejected[0].error.issues[0],
            ValidationIssue::Unreadable { .. }
        ));
        assert_eq!(
            read.rejected[1].error.issues,
            vec![ValidationIssue::TooLarge { size: 64, limit: 32 }]
        );
    }

    #[tokio::test]
    async fn test_all_failed_batch_keeps_outcomes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let broken = temp_dir.path().join("broken.pdf");
        std::fs::write(&broken, b"%PDF-1.4\ngarbage").unwrap();
        let missing = temp_dir.path().join("missing.pdf");
        let options = options_in(temp_dir.path(), vec![missing, broken]);

        let summary = sort_files(options).await.unwrap();

        assert_eq!(summary.status, BatchStatus::Completed);
        assert_eq!(summary.outcomes.len(), 1);
        let outcome = &summary.outcomes[0];
        assert!(outcome.failed);
        assert_eq!(outcome.file_name, "broken.pdf");
        assert!(outcome
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Failed to parse PDF"));

        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.rejected[0].submitted_index, 0);
        assert!(summary.archive.is_none());
        assert!(!temp_dir.path().join("out.zip").exists());
        assert_eq!(summary.exit_code(), 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["outcomes"][0]["failed"], true);
    }

    #[tokio::test]
    async fn test_nothing_submitted_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tool = temp_dir.path().join("tool.exe");
        std::fs::write(&tool, b"MZ").unwrap();
        let options = options_in(temp_dir.path(), vec![tool]);

        let summary = sort_files(options).await.unwrap();

        assert_eq!(summary.status, BatchStatus::NothingSubmitted);
        assert!(summary.outcomes.is_empty());
        assert_eq!(summary.rejected.len(), 1);
        assert!(summary.archive.is_none());
        assert_eq!(summary.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_save_settings_writes_overrides() {
        let temp_dir = tempfile::tempdir().unwrap();
        let tool = temp_dir.path().join("tool.exe");
        std::fs::write(&tool, b"MZ").unwrap();
        let options = RunOptions {
            concurrency: Some(3),
            save_settings: true,
            ..options_in(temp_dir.path(), vec![tool])
        };

        sort_files(options).await.unwrap();

        let saved = Settings::load(&temp_dir.path().join("settings.json"));
        assert_eq!(saved.concurrency_limit, 3);
    }

    #[tokio::test]
    async fn test_no_files_is_an_error() {
        let err = sort_files(RunOptions::default()).await.unwrap_err();

        assert!(matches!(err, CliError::NoInput { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_render_summary() {
        let outcomes = vec![
            outcome(0, "w2.png", "Tax Documents", 62.8),
            outcome(1, "blank.png", "Errors", 0.0),
        ];
        let summary = Summary {
            batch_id: "batch".to_string(),
            status: BatchStatus::Completed,
            stats: category_stats(&outcomes),
            outcomes,
            rejected: vec![Rejection {
                submitted_index: 2,
                error: ValidationError {
                    file_name: "tool.exe".to_string(),
                    issues: vec![ValidationIssue::UnsafeExtension],
                },
            }],
            archive: Some(PathBuf::from("out.zip")),
        };

        let text = render_summary(&summary);

        assert!(text.contains("Tax Documents (63%)"));
        assert!(text.contains("Errors (No text found in document)"));
        assert!(text.contains("skipped: Potentially unsafe file extension detected"));
        assert!(text.contains("Processed 2 file(s): 1 categorized, 1 failed, 1 skipped"));
        assert!(text.contains("Archive: out.zip"));
        assert!(!text.contains("cancelled"));
    }
}
