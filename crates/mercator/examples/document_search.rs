//! Full-text document search with highlighting
//!
//! This example demonstrates:
//! - Indexing every file of a directory
//! - Plain and explained text searches
//! - Plugging in a custom text extractor
//!
//! Usage: `document_search [DIR] [QUERY]`

use std::path::PathBuf;

use mercator::data_processing::DataError;
use mercator::{DocumentSearcher, ExtractedText, IndexHandle, MercatorConfig, TextExtractor};

/// Reads text files, and strips `#` comment lines from them.
struct CommentStrippingExtractor;

impl TextExtractor for CommentStrippingExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<ExtractedText, DataError> {
        let text = std::str::from_utf8(bytes).map_err(|e| DataError::Extraction {
            name: name.to_owned(),
            reason: e.to_string(),
        })?;
        let contents = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ExtractedText {
            contents,
            ..ExtractedText::default()
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    mercator::init_logging(tracing::Level::INFO)?;

    let mut args = std::env::args().skip(1);
    let sample_dir = tempfile::tempdir()?;
    let docs_dir = match args.next() {
        Some(dir) => PathBuf::from(dir),
        None => {
            write_samples(sample_dir.path())?;
            sample_dir.path().to_path_buf()
        }
    };
    let query = args.next().unwrap_or_else(|| "river".to_owned());

    let index_dir = tempfile::tempdir()?;
    let config = MercatorConfig::builder().highlight(40, 3).build()?;
    let handle = IndexHandle::open(index_dir.path(), mercator::DocumentIndexDef)?;
    let searcher =
        DocumentSearcher::with_config(handle, config)?.with_extractor(CommentStrippingExtractor);

    let report = searcher.index_document_dir(&docs_dir)?;
    println!(
        "Indexed {} documents from {} ({} skipped)",
        report.documents_written,
        docs_dir.display(),
        report.skipped.len()
    );

    println!("\nResults for {query:?}:");
    for result in searcher.search_text(&query, false)? {
        println!("{result}");
    }

    println!("\nExplained:");
    if let Some(result) = searcher.search_text(&query, true)?.first() {
        println!("{result}");
    }

    Ok(())
}

fn write_samples(dir: &std::path::Path) -> std::io::Result<()> {
    std::fs::write(
        dir.join("delta.txt"),
        "Title: Delta Survey\n\nThe river splits into many channels before it reaches the sea.",
    )?;
    std::fs::write(
        dir.join("passes.txt"),
        "# draft\nMountain passes close in winter; the river crossings stay open.",
    )?;
    std::fs::write(dir.join("wells.txt"), "Desert wells are marked on every map.")
}
