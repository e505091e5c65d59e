//! Category-partitioned ZIP output.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Seek, Write};
use std::path::Path;

use docsort_core::validate::sanitize_file_name;
use docsort_core::{ProcessingOutcome, WorkItem};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Default archive name, e.g. `organized_documents_2024-03-01T10-15-00.zip`.
pub fn default_archive_name() -> String {
    format!(
        "organized_documents_{}.zip",
        chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S")
    )
}

/// Write one folder per category holding the original bytes of each file.
///
/// Returns the number of files written.
pub fn write_archive<W: Write + Seek>(
    writer: W,
    groups: &BTreeMap<String, Vec<ProcessingOutcome>>,
    items: &[WorkItem],
) -> zip::result::ZipResult<usize> {
    let by_index: HashMap<usize, &WorkItem> =
        items.iter().map(|item| (item.original_index, item)).collect();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let mut written = 0;

    for (category, outcomes) in groups {
        let folder = folder_name(category);
        zip.add_directory(format!("{}/", folder), options)?;

        let mut used = HashSet::new();
        for outcome in outcomes {
            let Some(item) = by_index.get(&outcome.original_index) else {
                tracing::warn!(index = outcome.original_index, "No file for outcome");
                continue;
            };

            let name = unique_name(&sanitize_file_name(&outcome.file_name), &mut used);
            zip.start_file(format!("{}/{}", folder, name), options)?;
            zip.write_all(&item.bytes)?;
            written += 1;
        }
    }

    zip.finish()?;
    Ok(written)
}

/// Create `path` and write the archive into it.
pub fn write_archive_file(
    path: &Path,
    groups: &BTreeMap<String, Vec<ProcessingOutcome>>,
    items: &[WorkItem],
) -> zip::result::ZipResult<usize> {
    let file = std::fs::File::create(path)?;
    let written = write_archive(std::io::BufWriter::new(file), groups, items)?;
    tracing::info!(path = %path.display(), files = written, "Wrote archive");
    Ok(written)
}

fn folder_name(category: &str) -> String {
    let name: String = category
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect();
    let name = name.trim();
    if name.is_empty() {
        "_".to_string()
    } else {
        name.to_string()
    }
}

/// Append ` (n)` before the extension until the name is unused.
fn unique_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };

    let mut n = 1;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsort_core::{group_by_category, FileType};
    use std::io::{Cursor, Read};

    fn outcome(index: usize, name: &str, category: &str) -> ProcessingOutcome {
        ProcessingOutcome {
            original_index: index,
            file_name: name.to_string(),
            category: category.to_string(),
            confidence: 50.0,
            score: 10,
            extracted_text: String::new(),
            failed: category == "Errors",
            error_message: None,
            processed_at: chrono::Utc::now(),
        }
    }

    fn item(index: usize, name: &str, body: &str) -> WorkItem {
        WorkItem::new(index, name, body.as_bytes().to_vec(), FileType::Image)
    }

    #[test]
    fn test_folders_per_category() {
        let items = vec![
            item(0, "w2 2023.png", "tax"),
            item(1, "bill.png", "invoice-a"),
            item(2, "bill.png", "invoice-b"),
            item(3, "blank.png", "nothing"),
        ];
        let outcomes = vec![
            outcome(0, "w2 2023.png", "Tax Documents"),
            outcome(1, "bill.png", "Invoices"),
            outcome(2, "bill.png", "Invoices"),
            outcome(3, "blank.png", "Errors"),
        ];
        let groups = group_by_category(&outcomes);

        let mut buffer = Cursor::new(Vec::new());
        let written = write_archive(&mut buffer, &groups, &items).unwrap();
        assert_eq!(written, 4);

        let mut archive = zip::ZipArchive::new(Cursor::new(buffer.into_inner())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "Errors/",
                "Errors/blank.png",
                "Invoices/",
                "Invoices/bill (1).png",
                "Invoices/bill.png",
                "Tax Documents/",
                "Tax Documents/w2_2023.png",
            ]
        );

        let mut content = String::new();
        archive
            .by_name("Invoices/bill (1).png")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "invoice-b");
    }

    #[test]
    fn test_empty_groups() {
        let mut buffer = Cursor::new(Vec::new());

        let written = write_archive(&mut buffer, &BTreeMap::new(), &[]).unwrap();

        assert_eq!(written, 0);
        let archive = zip::ZipArchive::new(Cursor::new(buffer.into_inner())).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_write_archive_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.zip");
        let items = vec![item(0, "memo.png", "hello")];
        let groups = group_by_category(&[outcome(0, "memo.png", "Other Documents")]);

        write_archive_file(&path, &groups, &items).unwrap();

        let archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();

        assert_eq!(unique_name("scan.pdf", &mut used), "scan.pdf");
        assert_eq!(unique_name("scan.pdf", &mut used), "scan (1).pdf");
        assert_eq!(unique_name("scan.pdf", &mut used), "scan (2).pdf");
        assert_eq!(unique_name("README", &mut used), "README");
        assert_eq!(unique_name("README", &mut used), "README (1)");
        assert_eq!(unique_name(".hidden", &mut used), ".hidden");
        assert_eq!(unique_name(".hidden", &mut used), ".hidden (1)");
    }

    #[test]
    fn test_default_archive_name() {
        let name = default_archive_name();

        assert!(name.starts_with("organized_documents_"));
        assert!(name.ends_with(".zip"));
        assert!(!name.contains(':'));
    }
}
