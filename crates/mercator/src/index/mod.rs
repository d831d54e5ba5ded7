//! Index definitions and the owned handle every operation runs against.
//!
//! An [`IndexHandle`] wraps one directory-backed tantivy index together with
//! the [`IndexDefinition`] that created it. Handles are cheap to clone and
//! are passed explicitly to the builder, the searches and the vocabulary
//! walk; there is no process-wide index state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mercator_data_processing::processed::text_fields;
use tantivy::directory::MmapDirectory;
use tantivy::schema::{FAST, Field, INDEXED, STORED, STRING, Schema, SchemaBuilder, TEXT};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{Index, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, TantivyError};
use tracing::{debug, info, instrument};

use crate::config::MercatorConfig;
use crate::error::{MercatorError, Result};

pub mod builder;

/// Column names of the gazetteer index.
pub mod gazetteer_fields {
    pub const PRIM_LAT_DEC: &str = "PRIM_LAT_DEC";
    pub const PRIM_LONG_DEC: &str = "PRIM_LONG_DEC";
    pub const SOURCE_LAT_DEC: &str = "SOURCE_LAT_DEC";
    pub const SOURCE_LONG_DEC: &str = "SOURCE_LONG_DEC";
    pub const ELEV_IN_M: &str = "ELEV_IN_M";
    pub const ELEV_IN_FT: &str = "ELEV_IN_FT";

    pub const FEATURE_NAME: &str = "FEATURE_NAME";
    pub const FEATURE_CLASS: &str = "FEATURE_CLASS";
    pub const STATE_ALPHA: &str = "STATE_ALPHA";
    pub const COUNTY_NAME: &str = "COUNTY_NAME";
    pub const MAP_NAME: &str = "MAP_NAME";

    /// Dynamic field holding classified columns the fixed schema lacks,
    /// keyed by their header name.
    pub const OTHER_FIELDS: &str = "OTHER_FIELDS";

    pub const NUMERIC: [&str; 6] = [
        PRIM_LAT_DEC,
        PRIM_LONG_DEC,
        SOURCE_LAT_DEC,
        SOURCE_LONG_DEC,
        ELEV_IN_M,
        ELEV_IN_FT,
    ];
    pub const TEXT: [&str; 5] = [FEATURE_NAME, FEATURE_CLASS, STATE_ALPHA, COUNTY_NAME, MAP_NAME];
}

/// Describes the schema of one kind of index.
pub trait IndexDefinition: fmt::Debug + Send + Sync + 'static {
    /// Unique name, also used as the directory name below the data directory.
    fn name(&self) -> &'static str;

    /// Defines the tantivy schema for this index.
    fn schema(&self) -> Schema;

    /// Field that free-text queries search when no field is named.
    fn default_search_field(&self) -> &'static str;

    /// JSON field collecting mapped fields the schema does not declare.
    /// Without one such fields are dropped.
    fn overflow_field(&self) -> Option<&'static str> {
        None
    }
}

/// Gazetteer places: decimal coordinates and elevations as range-queryable
/// numbers, descriptive columns as analyzed text. Every field is stored.
///
/// Columns outside the GNIS set that still classify as numeric or text land
/// in [`gazetteer_fields::OTHER_FIELDS`] under their own header name.
#[derive(Debug, Clone, Copy, Default)]
pub struct GazetteerIndexDef;

impl IndexDefinition for GazetteerIndexDef {
    fn name(&self) -> &'static str {
        mercator_data_processing::PLACE_INDEX_DIR
    }

    fn schema(&self) -> Schema {
        let mut schema_builder = SchemaBuilder::new();
        for name in gazetteer_fields::NUMERIC {
            schema_builder.add_f64_field(name, INDEXED | STORED | FAST);
        }
        for name in gazetteer_fields::TEXT {
            schema_builder.add_text_field(name, TEXT | STORED);
        }
        schema_builder.add_json_field(gazetteer_fields::OTHER_FIELDS, TEXT | STORED);
        schema_builder.build()
    }

    fn default_search_field(&self) -> &'static str {
        gazetteer_fields::FEATURE_NAME
    }

    fn overflow_field(&self) -> Option<&'static str> {
        Some(gazetteer_fields::OTHER_FIELDS)
    }
}

/// Extracted documents. `name` and `path` match exactly, `summary` is only
/// stored for display.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentIndexDef;

impl IndexDefinition for DocumentIndexDef {
    fn name(&self) -> &'static str {
        mercator_data_processing::DOCUMENT_INDEX_DIR
    }

    fn schema(&self) -> Schema {
        let mut schema_builder = SchemaBuilder::new();
        schema_builder.add_text_field(text_fields::NAME, STRING | STORED);
        schema_builder.add_text_field(text_fields::PATH, STRING | STORED);
        schema_builder.add_text_field(text_fields::TITLE, TEXT | STORED);
        schema_builder.add_text_field(text_fields::AUTHOR, TEXT | STORED);
        schema_builder.add_text_field(text_fields::CONTENTS, TEXT | STORED);
        schema_builder.add_text_field(text_fields::SUMMARY, STORED);
        schema_builder.build()
    }

    fn default_search_field(&self) -> &'static str {
        text_fields::CONTENTS
    }
}

struct HandleInner {
    index: Index,
    location: Option<PathBuf>,
    definition: Box<dyn IndexDefinition>,
    writer_slot: Mutex<()>,
}

/// Owned handle to one index.
///
/// At most one writer session is open per handle at any time; readers are
/// opened per call and never cached, so a commit is visible to the next
/// search without reopening the handle.
#[derive(Clone)]
pub struct IndexHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexHandle")
            .field("name", &self.inner.definition.name())
            .field("location", &self.inner.location)
            .finish_non_exhaustive()
    }
}

impl IndexHandle {
    /// Opens the index stored in `dir`, creating the directory and an empty
    /// index when needed.
    #[instrument(name = "Open Index", skip(definition), fields(index_name = definition.name()))]
    pub fn open(dir: &Path, definition: impl IndexDefinition) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let directory = MmapDirectory::open(dir).map_err(TantivyError::from)?;
        let index = Index::open_or_create(directory, definition.schema())?;
        info!(path = ?dir, "Opened index");
        Ok(Self::from_parts(index, Some(dir.to_path_buf()), definition))
    }

    /// Opens the index in its default directory below the data directory.
    pub fn open_in_data_dir(definition: impl IndexDefinition) -> Result<Self> {
        let dir = mercator_data_processing::get_data_dir().join(definition.name());
        Self::open(&dir, definition)
    }

    /// Creates a non-persistent index, mostly useful in tests.
    pub fn create_in_ram(definition: impl IndexDefinition) -> Self {
        let index = Index::create_in_ram(definition.schema());
        Self::from_parts(index, None, definition)
    }

    fn from_parts(
        index: Index,
        location: Option<PathBuf>,
        definition: impl IndexDefinition,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                index,
                location,
                definition: Box::new(definition),
                writer_slot: Mutex::new(()),
            }),
        }
    }

    pub fn index(&self) -> &Index {
        &self.inner.index
    }

    pub fn name(&self) -> &'static str {
        self.inner.definition.name()
    }

    /// Directory of the index, `None` for in-memory indexes.
    pub fn location(&self) -> Option<&Path> {
        self.inner.location.as_deref()
    }

    pub fn schema(&self) -> Schema {
        self.inner.index.schema()
    }

    /// Looks up a field the caller requires to exist.
    pub fn field(&self, name: &str) -> Result<Field> {
        self.schema()
            .get_field(name)
            .map_err(|_| MercatorError::SchemaMismatch(name.to_owned()))
    }

    pub fn default_search_field(&self) -> Result<Field> {
        self.field(self.inner.definition.default_search_field())
    }

    /// The dynamic field for undeclared mapped fields, if the index has one.
    pub fn overflow_field(&self) -> Option<Field> {
        let name = self.inner.definition.overflow_field()?;
        self.schema().get_field(name).ok()
    }

    /// The analyzer the index applies to `field`.
    pub fn analyzer(&self, field: Field) -> Result<TextAnalyzer> {
        Ok(self.inner.index.tokenizer_for_field(field)?)
    }

    /// Opens a writer session, waiting for any other session on this handle
    /// to close first.
    pub fn writer(&self, config: &MercatorConfig) -> Result<WriterSession<'_>> {
        let guard = self
            .inner
            .writer_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let writer = self
            .inner
            .index
            .writer_with_num_threads(config.writer_threads, config.writer_memory_bytes)?;
        debug!(index_name = self.name(), "Writer session opened");
        Ok(WriterSession {
            writer,
            _slot: guard,
        })
    }

    /// A fresh snapshot of everything committed so far.
    ///
    /// The snapshot is released when the returned searcher is dropped.
    pub fn snapshot(&self) -> Result<Searcher> {
        let reader = self
            .inner
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(reader.searcher())
    }

    /// Number of committed documents.
    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.snapshot()?.num_docs())
    }
}

/// An open writer. Dropping the session without committing discards the
/// documents added since the last commit and releases the writer lock.
pub struct WriterSession<'a> {
    writer: IndexWriter,
    _slot: MutexGuard<'a, ()>,
}

impl WriterSession<'_> {
    pub fn add(&mut self, doc: TantivyDocument) -> Result<u64> {
        Ok(self.writer.add_document(doc)?)
    }

    /// Makes every document added so far durable and visible to new readers.
    pub fn commit(&mut self) -> Result<u64> {
        Ok(self.writer.commit()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::schema::FieldType;
    use tempfile::TempDir;

    #[test]
    fn test_gazetteer_schema_field_types() {
        let schema = GazetteerIndexDef.schema();
        for name in gazetteer_fields::NUMERIC {
            let entry = schema.get_field_entry(schema.get_field(name).unwrap());
            assert!(matches!(entry.field_type(), FieldType::F64(_)), "{name}");
            assert!(entry.is_stored());
        }
        for name in gazetteer_fields::TEXT {
            let entry = schema.get_field_entry(schema.get_field(name).unwrap());
            assert!(matches!(entry.field_type(), FieldType::Str(_)), "{name}");
            assert!(entry.is_stored());
        }
        assert!(schema.get_field("FEATURE_ID").is_err());

        let other = schema.get_field_entry(schema.get_field(gazetteer_fields::OTHER_FIELDS).unwrap());
        assert!(matches!(other.field_type(), FieldType::JsonObject(_)));
        assert!(other.is_indexed());
    }

    #[test]
    fn test_document_summary_is_not_indexed() {
        let schema = DocumentIndexDef.schema();
        let summary = schema.get_field_entry(schema.get_field(text_fields::SUMMARY).unwrap());
        assert!(summary.is_stored());
        assert!(!summary.is_indexed());
    }

    #[test]
    fn test_open_creates_directory_and_reopens() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("places");

        let handle = IndexHandle::open(&dir, GazetteerIndexDef).unwrap();
        assert_eq!(handle.num_docs().unwrap(), 0);
        assert_eq!(handle.location(), Some(dir.as_path()));
        drop(handle);

        let reopened = IndexHandle::open(&dir, GazetteerIndexDef).unwrap();
        assert_eq!(reopened.name(), "place_index");
        assert!(reopened.field(gazetteer_fields::PRIM_LAT_DEC).is_ok());
    }

    #[test]
    fn test_unknown_field_is_schema_mismatch() {
        let handle = IndexHandle::create_in_ram(DocumentIndexDef);
        let err = handle.field("FEATURE_NAME").unwrap_err();
        assert!(matches!(err, MercatorError::SchemaMismatch(ref f) if f == "FEATURE_NAME"));
        assert!(handle.overflow_field().is_none());
    }

    #[test]
    fn test_uncommitted_documents_are_discarded() {
        let handle = IndexHandle::create_in_ram(DocumentIndexDef);
        let contents = handle.field(text_fields::CONTENTS).unwrap();
        let config = MercatorConfig::default();

        let mut session = handle.writer(&config).unwrap();
        let mut doc = TantivyDocument::default();
        doc.add_text(contents, "committed");
        session.add(doc).unwrap();
        session.commit().unwrap();

        let mut doc = TantivyDocument::default();
        doc.add_text(contents, "never committed");
        session.add(doc).unwrap();
        drop(session);

        assert_eq!(handle.num_docs().unwrap(), 1);
        // the writer lock was released with the session
        assert!(handle.writer(&config).is_ok());
    }
}
