//! Field mapping and normalized documents.
//!
//! Gazetteer columns are classified by case-sensitive substring tests on the
//! header name: coordinates and elevations become numbers usable in range
//! queries, a handful of descriptive columns become analyzed text, and
//! everything else is dropped.
use tracing::trace;

use super::error::{DataError, Result};
use super::raw::RawRecord;
use super::raw::extract::ExtractedText;

/// Header substrings whose columns are indexed as range-queryable numbers.
pub const NUMERIC_HEADER_MARKERS: [&str; 3] = ["LAT_DEC", "LONG_DEC", "ELEV"];

/// Header substrings whose columns are indexed as analyzed, stored text.
pub const TEXT_HEADER_MARKERS: [&str; 5] = [
    "STATE_ALPHA",
    "FEATURE_NAME",
    "COUNTY_NAME",
    "MAP_NAME",
    "FEATURE_CLASS",
];

/// How a single field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    /// Parsed as a floating point number, indexed for range queries and stored.
    NumericRange,
    /// Tokenized for relevance search and stored for display.
    AnalyzedStored,
    /// Not indexed at all.
    Dropped,
}

/// Classifies a gazetteer column by its header name alone.
pub fn classify_header(field_name: &str) -> FieldSpec {
    if NUMERIC_HEADER_MARKERS
        .iter()
        .any(|marker| field_name.contains(marker))
    {
        FieldSpec::NumericRange
    } else if TEXT_HEADER_MARKERS
        .iter()
        .any(|marker| field_name.contains(marker))
    {
        FieldSpec::AnalyzedStored
    } else {
        FieldSpec::Dropped
    }
}

/// Decides how `(field_name, raw_value)` is indexed.
///
/// Returns `None` for an empty value: the field is absent from the document
/// whatever its declared kind.
pub fn map_field(field_name: &str, raw_value: &str) -> Option<FieldSpec> {
    if raw_value.is_empty() {
        return None;
    }
    Some(classify_header(field_name))
}

/// A field value together with the way it is indexed.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numeric(f64),
    /// Searchable and stored.
    Text(String),
    /// Stored for display, never searched.
    TextStoredOnly(String),
}

impl FieldValue {
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::TextStoredOnly(s) => Some(s),
            Self::Numeric(_) => None,
        }
    }
}

/// Field name to value mapping handed to the index builder.
///
/// Field names are case sensitive and keep their input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDocument {
    fields: Vec<(String, FieldValue)>,
}

impl NormalizedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    /// First value recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Builds the normalized document for one gazetteer record.
///
/// Only the columns present in both `header` and `record` are considered and
/// empty cells are skipped. A numeric column that does not parse to a finite
/// number fails the whole record with [`DataError::MalformedNumericField`].
pub fn normalize_record(header: &[String], record: &RawRecord) -> Result<NormalizedDocument> {
    let mut doc = NormalizedDocument::new();
    for (name, raw) in record.columns(header) {
        match map_field(name, raw) {
            None => trace!(field = name, line = record.line, "Empty cell skipped"),
            Some(FieldSpec::Dropped) => {}
            Some(FieldSpec::NumericRange) => {
                let value = parse_numeric(raw).ok_or_else(|| DataError::MalformedNumericField {
                    field: name.to_owned(),
                    value: raw.to_owned(),
                    line: record.line,
                })?;
                doc.push(name, FieldValue::Numeric(value));
            }
            Some(FieldSpec::AnalyzedStored) => doc.push(name, FieldValue::Text(raw.to_owned())),
        }
    }
    Ok(doc)
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Field names of an ingested text document.
pub mod text_fields {
    pub const NAME: &str = "name";
    pub const PATH: &str = "path";
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const CONTENTS: &str = "contents";
    pub const SUMMARY: &str = "summary";
}

/// One ingested document file. Created once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    /// File name, matched exactly.
    pub name: String,
    /// Canonical file path, matched exactly.
    pub path: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub contents: String,
    /// Leading characters of `contents`, stored for display only.
    pub summary: String,
}

impl TextDocument {
    pub fn from_extracted(
        name: impl Into<String>,
        path: impl Into<String>,
        extracted: ExtractedText,
        summary_chars: usize,
    ) -> Self {
        let summary = extracted.contents.chars().take(summary_chars).collect();
        Self {
            name: name.into(),
            path: path.into(),
            title: extracted.title,
            author: extracted.author,
            contents: extracted.contents,
            summary,
        }
    }

    pub fn to_normalized(&self) -> NormalizedDocument {
        let mut doc = NormalizedDocument::new();
        doc.push(text_fields::NAME, FieldValue::Text(self.name.clone()));
        doc.push(text_fields::PATH, FieldValue::Text(self.path.clone()));
        if let Some(title) = &self.title {
            doc.push(text_fields::TITLE, FieldValue::Text(title.clone()));
        }
        if let Some(author) = &self.author {
            doc.push(text_fields::AUTHOR, FieldValue::Text(author.clone()));
        }
        doc.push(text_fields::CONTENTS, FieldValue::Text(self.contents.clone()));
        if !self.summary.is_empty() {
            doc.push(
                text_fields::SUMMARY,
                FieldValue::TextStoredOnly(self.summary.clone()),
            );
        }
        doc
    }
}
