//! Caller-facing entry points.
//!
//! [`PlaceSearcher`] owns the gazetteer index and [`DocumentSearcher`] the
//! document index. Both carry their [`MercatorConfig`] and a shared
//! [`WorkerPool`], so every operation can run either inline or as a queued
//! job.
//!
//! ```rust,no_run
//! use mercator::{BoundingBox, LatLon, PlaceSearcher};
//!
//! let searcher = PlaceSearcher::open_default()?;
//! searcher.index_record_file("NationalFile.txt".as_ref())?;
//!
//! let bounds = BoundingBox::new(LatLon::new(40.0, -75.0), LatLon::new(35.0, -70.0));
//! for place in searcher.search_spatial("creek", &bounds)? {
//!     println!("{place}");
//! }
//! # Ok::<(), mercator::error::MercatorError>(())
//! ```
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mercator_data_processing::{
    DelimitedReader, PlainTextExtractor, TextDocument, TextExtractor,
};
use rayon::prelude::*;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::config::MercatorConfig;
use crate::error::Result;
use crate::index::builder::{BuildReport, index_documents, index_records};
use crate::index::{DocumentIndexDef, GazetteerIndexDef, IndexHandle};
use crate::search::{
    BoundingBox, GeoResult, RenderedResult, search_names, search_spatial, search_text,
};
use crate::timing::format_elapsed;
use crate::vocabulary::{Vocabulary, list_vocabulary};
use crate::worker::{Submission, WorkRejected, WorkerPool};

/// Spatial search over a gazetteer index.
///
/// Cloning is cheap; clones share the index handle and the worker pool.
#[derive(Debug, Clone)]
pub struct PlaceSearcher {
    handle: IndexHandle,
    config: Arc<MercatorConfig>,
    pool: Arc<WorkerPool>,
}

impl PlaceSearcher {
    /// Opens (or creates) the gazetteer index in `dir`.
    #[instrument(name = "Open PlaceSearcher", level = "info")]
    pub fn open(dir: &Path) -> Result<Self> {
        Self::with_config(
            IndexHandle::open(dir, GazetteerIndexDef)?,
            MercatorConfig::default(),
        )
    }

    /// Opens the gazetteer index below the data directory.
    pub fn open_default() -> Result<Self> {
        Self::with_config(
            IndexHandle::open_in_data_dir(GazetteerIndexDef)?,
            MercatorConfig::default(),
        )
    }

    /// Wraps an already open handle. Starts the worker pool described by
    /// `config`.
    pub fn with_config(handle: IndexHandle, config: MercatorConfig) -> Result<Self> {
        let pool = WorkerPool::from_config(&config)?;
        Ok(Self {
            handle,
            config: Arc::new(config),
            pool: Arc::new(pool),
        })
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub fn config(&self) -> &MercatorConfig {
        &self.config
    }

    /// Committed documents.
    pub fn num_docs(&self) -> Result<u64> {
        self.handle.num_docs()
    }

    /// Appends every record of a `|`-delimited gazetteer file.
    ///
    /// Indexing the same file twice stores every record twice.
    pub fn index_record_file(&self, path: &Path) -> Result<BuildReport> {
        index_record_file(&self.handle, path, &self.config)
    }

    /// Places named like `query` inside `bounds`.
    pub fn search_spatial(&self, query: &str, bounds: &BoundingBox) -> Result<Vec<GeoResult>> {
        search_spatial(&self.handle, query, bounds, &self.config)
    }

    /// Places named like `query`, with or without coordinates.
    pub fn search_names(&self, query: &str) -> Result<Vec<GeoResult>> {
        search_names(&self.handle, query, &self.config)
    }

    pub fn list_vocabulary(&self) -> Vocabulary {
        list_vocabulary(&self.handle)
    }

    /// Queues an ingest job.
    pub fn submit_index_record_file(&self, path: impl Into<PathBuf>) -> Submission<BuildReport> {
        let (handle, config) = (self.handle.clone(), Arc::clone(&self.config));
        let path = path.into();
        self.pool
            .submit(move || index_record_file(&handle, &path, &config))
    }

    /// Queues a spatial search. Compare ticket sequence numbers to drop
    /// results of searches that were overtaken by newer ones.
    pub fn submit_search(
        &self,
        query: impl Into<String>,
        bounds: BoundingBox,
    ) -> Submission<Vec<GeoResult>> {
        let (handle, config) = (self.handle.clone(), Arc::clone(&self.config));
        let query = query.into();
        self.pool
            .submit(move || search_spatial(&handle, &query, &bounds, &config))
    }

    /// Rejection events of the shared worker pool.
    pub fn subscribe_rejections(&self) -> crossbeam_channel::Receiver<WorkRejected> {
        self.pool.subscribe_rejections()
    }
}

/// Full-text search over extracted documents.
#[derive(Clone)]
pub struct DocumentSearcher {
    handle: IndexHandle,
    config: Arc<MercatorConfig>,
    pool: Arc<WorkerPool>,
    extractor: Arc<dyn TextExtractor>,
}

impl std::fmt::Debug for DocumentSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSearcher")
            .field("handle", &self.handle)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentSearcher {
    /// Opens (or creates) the document index in `dir`, reading files as
    /// plain text.
    #[instrument(name = "Open DocumentSearcher", level = "info")]
    pub fn open(dir: &Path) -> Result<Self> {
        Self::with_config(
            IndexHandle::open(dir, DocumentIndexDef)?,
            MercatorConfig::default(),
        )
    }

    /// Opens the document index below the data directory.
    pub fn open_default() -> Result<Self> {
        Self::with_config(
            IndexHandle::open_in_data_dir(DocumentIndexDef)?,
            MercatorConfig::default(),
        )
    }

    pub fn with_config(handle: IndexHandle, config: MercatorConfig) -> Result<Self> {
        let pool = WorkerPool::from_config(&config)?;
        Ok(Self {
            handle,
            config: Arc::new(config),
            pool: Arc::new(pool),
            extractor: Arc::new(PlainTextExtractor),
        })
    }

    /// Replaces the converter used to turn files into text.
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    pub fn num_docs(&self) -> Result<u64> {
        self.handle.num_docs()
    }

    /// Extracts and appends one file. A file the extractor refuses is
    /// reported in [`BuildReport::skipped`].
    pub fn index_document_file(&self, path: &Path) -> Result<BuildReport> {
        index_document_file(&self.handle, path, self.extractor.as_ref(), &self.config)
    }

    /// Extracts every file below `dir` in parallel, then appends them in one
    /// writer session.
    #[instrument(name = "Index Document Directory", skip(self), level = "info")]
    pub fn index_document_dir(&self, dir: &Path) -> Result<BuildReport> {
        let started = Instant::now();
        let files = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.map_err(std::io::Error::from))
            .filter(|entry| entry.as_ref().map_or(true, |e| e.file_type().is_file()))
            .map(|entry| entry.map(walkdir::DirEntry::into_path))
            .collect::<std::io::Result<Vec<_>>>()?;

        let documents: Vec<_> = files
            .par_iter()
            .map(|path| read_document(path, self.extractor.as_ref(), self.config.summary_chars))
            .collect();
        debug!(
            files = documents.len(),
            "Extracted documents in {}",
            format_elapsed(started.elapsed())
        );

        index_documents(&self.handle, documents, &self.config)
    }

    /// Documents whose contents match `query`, rendered as HTML.
    pub fn search_text(&self, query: &str, explain: bool) -> Result<Vec<RenderedResult>> {
        search_text(&self.handle, query, explain, &self.config)
    }

    pub fn list_vocabulary(&self) -> Vocabulary {
        list_vocabulary(&self.handle)
    }

    pub fn submit_index_document_file(&self, path: impl Into<PathBuf>) -> Submission<BuildReport> {
        let (handle, config) = (self.handle.clone(), Arc::clone(&self.config));
        let extractor = Arc::clone(&self.extractor);
        let path = path.into();
        self.pool.submit(move || {
            index_document_file(&handle, &path, extractor.as_ref(), &config)
        })
    }

    pub fn submit_search(
        &self,
        query: impl Into<String>,
        explain: bool,
    ) -> Submission<Vec<RenderedResult>> {
        let (handle, config) = (self.handle.clone(), Arc::clone(&self.config));
        let query = query.into();
        self.pool
            .submit(move || search_text(&handle, &query, explain, &config))
    }

    pub fn subscribe_rejections(&self) -> crossbeam_channel::Receiver<WorkRejected> {
        self.pool.subscribe_rejections()
    }
}

// Queued jobs capture the handle and config only, never the pool itself.

#[instrument(name = "Index Record File", skip(handle, config), level = "info")]
fn index_record_file(
    handle: &IndexHandle,
    path: &Path,
    config: &MercatorConfig,
) -> Result<BuildReport> {
    let reader = DelimitedReader::open_gazetteer(path)?;
    let report = index_records(handle, reader, config)?;
    info!(
        documents = report.documents_written,
        skipped = report.skipped.len(),
        "Indexed {} in {}",
        path.display(),
        format_elapsed(report.elapsed)
    );
    Ok(report)
}

#[instrument(name = "Index Document File", skip(handle, extractor, config), level = "info")]
fn index_document_file(
    handle: &IndexHandle,
    path: &Path,
    extractor: &dyn TextExtractor,
    config: &MercatorConfig,
) -> Result<BuildReport> {
    let document = read_document(path, extractor, config.summary_chars);
    index_documents(handle, [document], config)
}

fn read_document(
    path: &Path,
    extractor: &dyn TextExtractor,
    summary_chars: usize,
) -> mercator_data_processing::Result<TextDocument> {
    let bytes = std::fs::read(path)?;
    let canonical = std::fs::canonicalize(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extracted = extractor.extract(&name, &bytes)?;
    Ok(TextDocument::from_extracted(
        name,
        canonical.to_string_lossy(),
        extracted,
        summary_chars,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LatLon;
    use mercator_data_processing::test_data::{TestDataConfig, create_test_data};

    #[test]
    fn test_place_searcher_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = PlaceSearcher::open(dir.path()).unwrap();
        let file = create_test_data(&TestDataConfig::minimal()).unwrap();

        let report = searcher.index_record_file(file.path()).unwrap();
        assert_eq!(report.documents_written, 5);

        let results = searcher.search_spatial("Example", &BoundingBox::WORLD).unwrap();
        assert_eq!(results.len(), 2);
        let mount = BoundingBox::new(LatLon::new(39.0, -107.0), LatLon::new(38.0, -106.0));
        let results = searcher.search_spatial("Example", &mount).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].label.contains("Mount Example"));
    }

    #[test]
    fn test_reopened_index_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let file = create_test_data(&TestDataConfig::minimal()).unwrap();
        {
            let searcher = PlaceSearcher::open(dir.path()).unwrap();
            searcher.index_record_file(file.path()).unwrap();
        }
        let reopened = PlaceSearcher::open(dir.path()).unwrap();
        assert_eq!(reopened.num_docs().unwrap(), 5);
    }

    #[test]
    fn test_document_searcher_indexes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let docs = tempfile::tempdir().unwrap();
        let file = docs.path().join("notes.txt");
        std::fs::write(&file, "Title: Field Notes\n\nThe river bends twice").unwrap();

        let searcher = DocumentSearcher::open(dir.path()).unwrap();
        let report = searcher.index_document_file(&file).unwrap();
        assert_eq!(report.documents_written, 1);

        let results = searcher.search_text("bends", false).unwrap();
        assert_eq!(results.len(), 1);
        let canonical = std::fs::canonicalize(&file).unwrap();
        assert_eq!(results[0].path.as_deref(), Some(&*canonical.to_string_lossy()));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let searcher = PlaceSearcher::open(dir.path()).unwrap();
        let err = searcher
            .index_record_file(&dir.path().join("absent.txt"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
