//! Seam to the document-to-text converter.
//!
//! Real converters (PDF, office formats) live outside this workspace; they
//! plug in by implementing [`TextExtractor`]. [`PlainTextExtractor`] covers
//! text files.
use crate::error::{DataError, Result};

/// Text and metadata recovered from one input document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub contents: String,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Converts the raw bytes of a named document into plain text.
pub trait TextExtractor: Send + Sync {
    /// `name` is the declared file name, used for format detection only.
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<ExtractedText>;
}

/// Accepts UTF-8 text (lossily) and refuses anything that looks binary.
///
/// A leading `Title:` or `Author:` line is lifted into the metadata and kept
/// in the contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<ExtractedText> {
        if bytes.contains(&0) {
            return Err(DataError::Extraction {
                name: name.to_owned(),
                reason: "binary content".to_owned(),
            });
        }
        let contents = String::from_utf8_lossy(bytes).into_owned();

        let mut title = None;
        let mut author = None;
        for line in contents.lines().take_while(|l| !l.trim().is_empty()) {
            if let Some(value) = header_value(line, "Title:") {
                title.get_or_insert(value);
            } else if let Some(value) = header_value(line, "Author:") {
                author.get_or_insert(value);
            } else {
                break;
            }
        }

        Ok(ExtractedText {
            contents,
            title,
            author,
        })
    }
}

fn header_value(line: &str, key: &str) -> Option<String> {
    let value = line.strip_prefix(key)?.trim();
    (!value.is_empty()).then(|| value.to_owned())
}
