//! Input side of the mercator search core.
//!
//! Turns raw input into [`NormalizedDocument`]s without knowing anything about
//! the search engine that will eventually store them:
//!
//! - [`raw`] splits `|`-delimited gazetteer files into positional records and
//!   hosts the document-to-text extraction seam.
//! - [`processed`] decides, per field, how a value is indexed and builds the
//!   normalized documents the index builder consumes.
//! - [`test_data`] writes small GNIS-shaped fixture files.
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::warn;

pub mod processed;
pub mod raw;
pub mod test_data;

mod error;

pub use error::{DataError, Result};
pub use processed::{
    FieldSpec, FieldValue, NormalizedDocument, TextDocument, classify_header, map_field,
    normalize_record,
};
pub use raw::extract::{ExtractedText, PlainTextExtractor, TextExtractor};
pub use raw::{DelimitedReader, GAZETTEER_DELIMITER, RawRecord};
pub use test_data::{TestDataConfig, create_test_data};

static TEST_DATA_DIR: Lazy<Option<tempfile::TempDir>> = Lazy::new(|| {
    tempfile::TempDir::new()
        .inspect_err(|e| warn!(error = %e, "Failed to create temporary test data directory"))
        .ok()
});

pub const DATA_DIR_DEFAULT: &str = "./mercator_data";
pub const DATA_DIR_ENV: &str = "MERCATOR_DATA_DIR";

/// Directory name of the gazetteer index below the data directory.
pub const PLACE_INDEX_DIR: &str = "place_index";
/// Directory name of the document index below the data directory.
pub const DOCUMENT_INDEX_DIR: &str = "document_index";

/// Global data directory path that automatically determines the appropriate location.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if cfg!(test)
        && let Some(temp_dir) = TEST_DATA_DIR.as_ref()
    {
        let temp_dir = temp_dir.path().to_path_buf();
        warn!(temp_dir = ?temp_dir, "Using temporary data directory for tests");
        return temp_dir;
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    system_data_dir().unwrap_or_else(|| PathBuf::from(DATA_DIR_DEFAULT))
});

/// Root directory holding every index this workspace manages.
pub fn get_data_dir() -> &'static std::path::Path {
    DATA_DIR.as_path()
}

#[cfg(feature = "system-dirs")]
fn system_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "mercator", "mercator")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(not(feature = "system-dirs"))]
const fn system_data_dir() -> Option<PathBuf> {
    None
}
