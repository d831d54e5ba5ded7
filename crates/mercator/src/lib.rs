//! Mercator - Spatial and Full-Text Search Core
//!
//! Mercator indexes `|`-delimited gazetteer files (USGS GNIS style) and
//! arbitrary text documents into [tantivy](https://docs.rs/tantivy) indexes,
//! and answers two kinds of questions about them:
//!
//! - **Spatial search**: places whose name matches a query and whose
//!   coordinates fall inside a bounding box.
//! - **Text search**: documents whose contents match a query, rendered as
//!   HTML with the best matching fragments highlighted.
//!
//! # Quick Start
//!
//! ```rust
//! use mercator::{BoundingBox, LatLon, PlaceSearcher};
//! use mercator::data_processing::test_data::{TestDataConfig, create_test_data};
//!
//! let dir = tempfile::tempdir()?;
//! let searcher = PlaceSearcher::open(dir.path())?;
//!
//! let file = create_test_data(&TestDataConfig::minimal())?;
//! searcher.index_record_file(file.path())?;
//!
//! let bounds = BoundingBox::new(LatLon::new(39.0, -107.0), LatLon::new(38.0, -106.0));
//! let results = searcher.search_spatial("Example", &bounds)?;
//! assert_eq!(results.len(), 1);
//! println!("{}", results[0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Concurrency
//!
//! Every search opens a fresh index snapshot, so a commit is visible to the
//! next search. Each index accepts one writer session at a time. Work can be
//! queued on a small [`WorkerPool`]; when its queue is full new work is
//! rejected and reported as a [`WorkRejected`] event instead of blocking.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod config;
mod core;
pub mod error;
pub mod index;
pub mod search;
pub mod timing;
pub mod vocabulary;
pub mod worker;

pub use crate::core::{DocumentSearcher, PlaceSearcher};

pub use config::{MalformedRecordPolicy, MercatorConfig, MercatorConfigBuilder};
pub use error::{ErrorKind, MercatorError};
pub use index::builder::BuildReport;
pub use index::{DocumentIndexDef, GazetteerIndexDef, IndexDefinition, IndexHandle};
pub use mercator_data_processing as data_processing;
pub use mercator_data_processing::{ExtractedText, PlainTextExtractor, TextExtractor};
pub use search::{BoundingBox, GeoResult, Highlighter, LatLon, RenderedResult};
pub use timing::format_elapsed_ms;
pub use vocabulary::{Vocabulary, VocabularyEntry};
pub use worker::{Submission, Ticket, WorkRejected, WorkerPool};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Mercator library.
///
/// `RUST_LOG` takes precedence over `level` when set. tantivy's own logs are
/// capped at `warn`. Calling this more than once is harmless; only the first
/// call installs the subscriber.
///
/// # Examples
///
/// ```rust
/// use mercator::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), mercator::error::MercatorError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::MercatorError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercator_data_processing::test_data::{TestDataConfig, create_test_data};

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        setup_test_env();
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }

    #[test]
    fn test_sample_data_within_world_box() {
        setup_test_env();

        let dir = tempfile::tempdir().unwrap();
        let searcher = PlaceSearcher::open(dir.path()).unwrap();
        let config = TestDataConfig {
            generated_rows: 40,
            ..TestDataConfig::minimal()
        };
        let file = create_test_data(&config).unwrap();
        searcher.index_record_file(file.path()).unwrap();

        // one hand-picked place has no latitude
        let results = searcher.search_spatial("*", &BoundingBox::WORLD).unwrap();
        assert_eq!(results.len(), config.row_count() - 1);
    }
}
