use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "docsort")]
#[command(about = "Sort scanned documents and PDFs into category folders")]
struct Args {
    /// Image or PDF files to sort
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Number of files processed at once (default from settings, 10)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Archive path (default organized_documents_<timestamp>.zip)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only print the summary, do not write an archive
    #[arg(long)]
    no_archive: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Settings file to use instead of the one in the data directory
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Tesseract language, e.g. "eng" or "eng+deu"
    #[arg(long)]
    ocr_lang: Option<String>,

    /// Save the settings, with the overrides above applied, before sorting
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    let args = Args::parse();

    let code = docsort_lib::run(docsort_lib::RunOptions {
        files: args.files,
        concurrency: args.concurrency,
        output: args.output,
        no_archive: args.no_archive,
        json: args.json,
        settings: args.settings,
        ocr_lang: args.ocr_lang,
        save_settings: args.save_settings,
    });

    std::process::exit(code);
}
