//! Streams normalized documents into an index in committed batches.
use std::collections::{BTreeMap, HashMap};
use std::collections::hash_map::Entry;
use std::io::BufRead;
use std::time::{Duration, Instant};

use mercator_data_processing::{
    DataError, DelimitedReader, FieldValue, NormalizedDocument, TextDocument, normalize_record,
};
use tantivy::TantivyDocument;
use tantivy::schema::{Field, FieldType, OwnedValue, Schema};
use tracing::{debug, info, instrument, warn};

use super::{IndexHandle, WriterSession};
use crate::config::{MalformedRecordPolicy, MercatorConfig};
use crate::error::Result;
use crate::timing::format_elapsed;

/// Outcome of one build call.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Documents committed by this call.
    pub documents_written: u64,
    /// Number of commits performed.
    pub batches: usize,
    /// Records that failed to normalize and were skipped.
    pub skipped: Vec<DataError>,
    pub elapsed: Duration,
}

/// Indexes every record of a delimited gazetteer stream.
///
/// Documents are committed every `commit_batch_size` records. If the call
/// fails midway the batches committed before the failure stay in the index
/// and the batch in flight is discarded; the writer is released either way.
#[instrument(name = "Index Records", skip_all, fields(index_name = handle.name()))]
pub fn index_records<R: BufRead>(
    handle: &IndexHandle,
    reader: DelimitedReader<R>,
    config: &MercatorConfig,
) -> Result<BuildReport> {
    let (header, records) = reader.into_parts();
    let docs = records.map(|record| record.and_then(|record| normalize_record(&header, &record)));
    index_stream(handle, docs, config)
}

/// Indexes extracted documents. Extraction failures are treated like
/// malformed records.
#[instrument(name = "Index Documents", skip_all, fields(index_name = handle.name()))]
pub fn index_documents<I>(
    handle: &IndexHandle,
    documents: I,
    config: &MercatorConfig,
) -> Result<BuildReport>
where
    I: IntoIterator<Item = mercator_data_processing::Result<TextDocument>>,
{
    let docs = documents
        .into_iter()
        .map(|doc| doc.map(|doc| doc.to_normalized()));
    index_stream(handle, docs, config)
}

fn index_stream<I>(handle: &IndexHandle, docs: I, config: &MercatorConfig) -> Result<BuildReport>
where
    I: IntoIterator<Item = mercator_data_processing::Result<NormalizedDocument>>,
{
    let started = Instant::now();
    let mut converter = DocumentConverter::new(handle.schema(), handle.overflow_field());
    let mut session = handle.writer(config)?;
    let mut batch = Batch::new(config.commit_batch_size);
    let mut report = BuildReport::default();

    for doc in docs {
        let doc = match doc {
            Ok(doc) => doc,
            Err(e) if e.is_record_local() && config.malformed_records == MalformedRecordPolicy::Skip => {
                warn!(error = %e, "Skipping malformed record");
                report.skipped.push(e);
                continue;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    committed = report.documents_written,
                    discarded = batch.pending,
                    "Index build aborted"
                );
                return Err(e.into());
            }
        };
        session.add(converter.convert(&doc))?;
        if batch.push() {
            batch.commit(&mut session, &mut report)?;
        }
    }
    if batch.pending > 0 || report.batches == 0 {
        batch.commit(&mut session, &mut report)?;
    }
    drop(session);

    report.elapsed = started.elapsed();
    info!(
        documents = report.documents_written,
        batches = report.batches,
        skipped = report.skipped.len(),
        "Index build took {}",
        format_elapsed(report.elapsed)
    );
    Ok(report)
}

struct Batch {
    size: usize,
    pending: usize,
    started: Instant,
}

impl Batch {
    fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            pending: 0,
            started: Instant::now(),
        }
    }

    /// Counts one added document; true when the batch is full.
    fn push(&mut self) -> bool {
        self.pending += 1;
        self.pending >= self.size
    }

    fn commit(&mut self, session: &mut WriterSession<'_>, report: &mut BuildReport) -> Result<()> {
        session.commit()?;
        report.documents_written += self.pending as u64;
        report.batches += 1;
        info!(
            batch = report.batches,
            documents = self.pending,
            total = report.documents_written,
            "Committed batch in {}",
            format_elapsed(self.started.elapsed())
        );
        self.pending = 0;
        self.started = Instant::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldTarget {
    Numeric(Field),
    Text(Field),
    /// Keyed by its own name inside the overflow field.
    Overflow(Field),
}

/// Resolves normalized field names against the index schema.
///
/// Fields the schema lacks go to the overflow field when the index has one.
/// Otherwise, or when the schema declares them with another type, they are
/// dropped with a single warning per field name.
struct DocumentConverter {
    schema: Schema,
    overflow: Option<Field>,
    targets: HashMap<String, Option<FieldTarget>>,
}

impl DocumentConverter {
    fn new(schema: Schema, overflow: Option<Field>) -> Self {
        Self {
            schema,
            overflow,
            targets: HashMap::new(),
        }
    }

    fn convert(&mut self, doc: &NormalizedDocument) -> TantivyDocument {
        let mut out = TantivyDocument::default();
        let mut extra = BTreeMap::new();
        for (name, value) in doc.iter() {
            match (self.target(name, value), value) {
                (Some(FieldTarget::Numeric(field)), FieldValue::Numeric(v)) => {
                    out.add_f64(field, *v);
                }
                (
                    Some(FieldTarget::Text(field)),
                    FieldValue::Text(text) | FieldValue::TextStoredOnly(text),
                ) => out.add_text(field, text),
                (Some(FieldTarget::Overflow(_)), FieldValue::Numeric(v)) => {
                    extra.entry(name.to_owned()).or_insert(OwnedValue::F64(*v));
                }
                (Some(FieldTarget::Overflow(_)), FieldValue::Text(text)) => {
                    extra
                        .entry(name.to_owned())
                        .or_insert_with(|| OwnedValue::Str(text.clone()));
                }
                _ => {}
            }
        }
        if let Some(field) = self.overflow
            && !extra.is_empty()
        {
            out.add_object(field, extra);
        }
        out
    }

    fn target(&mut self, name: &str, value: &FieldValue) -> Option<FieldTarget> {
        let numeric = matches!(value, FieldValue::Numeric(_));
        match self.targets.entry(name.to_owned()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let target = match self.schema.get_field(name) {
                    Ok(field) if Some(field) == self.overflow => None,
                    Ok(field) => match (self.schema.get_field_entry(field).field_type(), numeric) {
                        (FieldType::F64(_), true) => Some(FieldTarget::Numeric(field)),
                        (FieldType::Str(_), false) => Some(FieldTarget::Text(field)),
                        (field_type, _) => {
                            warn!(
                                field = name,
                                ?field_type,
                                "Field type does not match the index schema, dropping it"
                            );
                            None
                        }
                    },
                    Err(_) => match self.overflow {
                        Some(field) if !matches!(value, FieldValue::TextStoredOnly(_)) => {
                            debug!(field = name, "Field is not part of the index schema, kept as other field");
                            Some(FieldTarget::Overflow(field))
                        }
                        _ => {
                            warn!(field = name, "Field is not part of the index schema, dropping it");
                            None
                        }
                    },
                };
                *entry.insert(target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DocumentIndexDef, GazetteerIndexDef, gazetteer_fields};
    use mercator_data_processing::test_data::{self, MINIMAL_PLACES, TestDataConfig};
    use mercator_data_processing::{ExtractedText, GAZETTEER_DELIMITER};
    use std::io::Cursor;
    use tantivy::schema::Value;

    fn gazetteer(config: &TestDataConfig) -> DelimitedReader<Cursor<Vec<u8>>> {
        let mut buf = Vec::new();
        test_data::write_gazetteer(&mut buf, config).unwrap();
        DelimitedReader::new(Cursor::new(buf), GAZETTEER_DELIMITER).unwrap()
    }

    fn small_batches(size: usize) -> MercatorConfig {
        MercatorConfig::builder()
            .commit_batch_size(size)
            .build()
            .unwrap()
    }

    #[test]
    fn test_index_records_commits_in_batches() {
        let handle = IndexHandle::create_in_ram(GazetteerIndexDef);
        let config = TestDataConfig {
            generated_rows: 7,
            include_malformed: false,
        };

        let report = index_records(&handle, gazetteer(&config), &small_batches(5)).unwrap();

        assert_eq!(report.documents_written, 12);
        assert_eq!(report.batches, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(handle.num_docs().unwrap(), 12);
    }

    #[test]
    fn test_malformed_record_is_skipped_by_default() {
        let handle = IndexHandle::create_in_ram(GazetteerIndexDef);
        let report = index_records(
            &handle,
            gazetteer(&TestDataConfig::with_malformed()),
            &MercatorConfig::default(),
        )
        .unwrap();

        assert_eq!(report.documents_written, MINIMAL_PLACES.len() as u64);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            report.skipped[0],
            DataError::MalformedNumericField { ref field, .. } if field == gazetteer_fields::PRIM_LAT_DEC
        ));
    }

    #[test]
    fn test_abort_policy_keeps_committed_batches() {
        let handle = IndexHandle::create_in_ram(GazetteerIndexDef);
        let config = MercatorConfig::builder()
            .commit_batch_size(2)
            .malformed_records(MalformedRecordPolicy::Abort)
            .build()
            .unwrap();

        let err = index_records(&handle, gazetteer(&TestDataConfig::with_malformed()), &config)
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);
        // five good rows: two full batches committed, the fifth row discarded
        assert_eq!(handle.num_docs().unwrap(), 4);
    }

    #[test]
    fn test_empty_stream_writes_nothing() {
        let handle = IndexHandle::create_in_ram(GazetteerIndexDef);
        let reader = DelimitedReader::new(Cursor::new(Vec::new()), GAZETTEER_DELIMITER).unwrap();
        let report = index_records(&handle, reader, &MercatorConfig::default()).unwrap();
        assert_eq!(report.documents_written, 0);
        assert_eq!(handle.num_docs().unwrap(), 0);
    }

    #[test]
    fn test_undeclared_mapped_fields_are_kept_as_other_fields() {
        let handle = IndexHandle::create_in_ram(GazetteerIndexDef);
        let input = "FEATURE_NAME|ELEVATION|BGN_FEATURE_CLASS|FEATURE_ID|LAT_DEC\n\
                     Peak|1234|Summit|99|40.5\n";
        let reader =
            DelimitedReader::new(Cursor::new(input.as_bytes().to_vec()), GAZETTEER_DELIMITER)
                .unwrap();

        let report = index_records(&handle, reader, &MercatorConfig::default()).unwrap();
        assert_eq!(report.documents_written, 1);

        let searcher = handle.snapshot().unwrap();
        let (_, address) = searcher
            .search(&tantivy::query::AllQuery, &tantivy::collector::TopDocs::with_limit(1))
            .unwrap()[0];
        let doc: TantivyDocument = searcher.doc(address).unwrap();
        let other = handle.field(gazetteer_fields::OTHER_FIELDS).unwrap();
        let stored = doc.get_first(other).map(|value| OwnedValue::from(value.as_value()));
        let Some(OwnedValue::Object(entries)) = stored else {
            panic!("other fields must be stored as one object");
        };
        let keys: Vec<_> = entries.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["BGN_FEATURE_CLASS", "ELEVATION", "LAT_DEC"]);
        assert!(entries.contains(&("ELEVATION".to_owned(), OwnedValue::F64(1234.0))));
    }

    #[test]
    fn test_undeclared_field_is_dropped_without_overflow() {
        let handle = IndexHandle::create_in_ram(DocumentIndexDef);
        let mut doc = NormalizedDocument::new();
        doc.push("contents", FieldValue::Text("rivers".into()));
        doc.push("ELEVATION", FieldValue::Numeric(12.0));

        let mut converter = DocumentConverter::new(handle.schema(), handle.overflow_field());
        let out = converter.convert(&doc);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_index_documents_counts_extraction_failures() {
        let handle = IndexHandle::create_in_ram(DocumentIndexDef);
        let docs = vec![
            Ok(TextDocument::from_extracted(
                "a.txt",
                "/docs/a.txt",
                ExtractedText {
                    contents: "rivers and lakes".into(),
                    ..ExtractedText::default()
                },
                500,
            )),
            Err(DataError::Extraction {
                name: "b.bin".into(),
                reason: "binary content".into(),
            }),
        ];

        let report = index_documents(&handle, docs, &MercatorConfig::default()).unwrap();
        assert_eq!(report.documents_written, 1);
        assert_eq!(report.skipped.len(), 1);
    }
}
