//! Term dictionary dump for diagnostics.
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use itertools::Itertools;
use tantivy::Searcher;
use tantivy::schema::{Field, FieldType, Type};
use tracing::{debug, error};

use crate::error::Result;
use crate::index::IndexHandle;
use crate::timing::decimal;

/// Separators of tantivy's dynamic field term keys.
const JSON_PATH_SEGMENT_SEP: u8 = 1;
const JSON_END_OF_PATH: u8 = 0;

/// One distinct term of one field and the number of documents containing it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VocabularyEntry {
    pub field: String,
    pub term: String,
    pub doc_freq: u64,
}

impl fmt::Display for VocabularyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (doc freq={})", self.field, self.term, self.doc_freq)
    }
}

#[derive(Debug, Clone, Copy)]
enum TermKind {
    Text,
    Float,
    /// Dynamic field; each term carries its own path and value type.
    Json,
}

/// Lazy walk over every indexed field of a snapshot.
///
/// Fields are visited in schema order and terms in dictionary order. A field
/// is only read once the previous one is exhausted. A read failure is logged
/// and ends the sequence.
pub struct Vocabulary {
    searcher: Option<Searcher>,
    pending_fields: VecDeque<(Field, String, TermKind)>,
    current: std::vec::IntoIter<VocabularyEntry>,
    load_terms: TermLoader,
}

type TermLoader = fn(&Searcher, Field) -> Result<BTreeMap<Vec<u8>, u64>>;

impl Vocabulary {
    fn empty() -> Self {
        Self {
            searcher: None,
            pending_fields: VecDeque::new(),
            current: Vec::new().into_iter(),
            load_terms: merged_doc_freqs,
        }
    }

    fn load_next_field(&mut self) -> bool {
        let Some(searcher) = &self.searcher else {
            return false;
        };
        let Some((field, name, kind)) = self.pending_fields.pop_front() else {
            self.searcher = None;
            return false;
        };
        match (self.load_terms)(searcher, field) {
            Ok(terms) => {
                debug!(field = %name, terms = terms.len(), "Loaded field vocabulary");
                self.current = terms
                    .into_iter()
                    .map(|(key, doc_freq)| {
                        let (field, term) = match kind {
                            TermKind::Json => decode_json_term(&key),
                            _ => (name.clone(), decode_term(&key, kind)),
                        };
                        VocabularyEntry {
                            field,
                            term,
                            doc_freq,
                        }
                    })
                    .collect::<Vec<_>>()
                    .into_iter();
                true
            }
            Err(e) => {
                error!(field = %name, error = %e, "Failed to read the term dictionary, vocabulary ends here");
                self.searcher = None;
                self.pending_fields.clear();
                false
            }
        }
    }
}

impl Iterator for Vocabulary {
    type Item = VocabularyEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.next() {
                return Some(entry);
            }
            if !self.load_next_field() {
                return None;
            }
        }
    }
}

/// Every `(field, term, doc_freq)` of the index, read from a fresh snapshot.
///
/// Failing to open the snapshot is logged and yields an empty sequence.
pub fn list_vocabulary(handle: &IndexHandle) -> Vocabulary {
    let searcher = match handle.snapshot() {
        Ok(searcher) => searcher,
        Err(e) => {
            error!(index_name = handle.name(), error = %e, "Failed to open index for vocabulary listing");
            return Vocabulary::empty();
        }
    };
    let schema = handle.schema();
    let pending_fields = schema
        .fields()
        .filter(|(_, entry)| entry.is_indexed())
        .filter_map(|(field, entry)| {
            let kind = match entry.field_type() {
                FieldType::Str(_) => TermKind::Text,
                FieldType::F64(_) => TermKind::Float,
                FieldType::JsonObject(_) => TermKind::Json,
                _ => return None,
            };
            Some((field, entry.name().to_owned(), kind))
        })
        .collect();
    Vocabulary {
        searcher: Some(searcher),
        pending_fields,
        current: Vec::new().into_iter(),
        load_terms: merged_doc_freqs,
    }
}

/// Document frequencies of one field, summed over all segments.
fn merged_doc_freqs(searcher: &Searcher, field: Field) -> Result<BTreeMap<Vec<u8>, u64>> {
    let mut merged = BTreeMap::new();
    for segment in searcher.segment_readers() {
        let inverted_index = segment.inverted_index(field)?;
        let mut stream = inverted_index.terms().stream()?;
        while stream.advance() {
            *merged.entry(stream.key().to_vec()).or_insert(0) += u64::from(stream.value().doc_freq);
        }
    }
    Ok(merged)
}

fn decode_term(key: &[u8], kind: TermKind) -> String {
    match (kind, <[u8; 8]>::try_from(key)) {
        (TermKind::Float, Ok(bytes)) => decimal(tantivy::u64_to_f64(u64::from_be_bytes(bytes))),
        _ => String::from_utf8_lossy(key).into_owned(),
    }
}

/// Splits a dynamic field term into its dotted path and its value.
///
/// Keys are laid out as `path, JSON_END_OF_PATH, type code, value bytes`.
fn decode_json_term(key: &[u8]) -> (String, String) {
    let Some(end) = key.iter().position(|&b| b == JSON_END_OF_PATH) else {
        return (String::new(), String::from_utf8_lossy(key).into_owned());
    };
    let path = key[..end]
        .split(|&b| b == JSON_PATH_SEGMENT_SEP)
        .map(String::from_utf8_lossy)
        .join(".");
    let value = key.get(end + 2..).unwrap_or_default();
    let fast = <[u8; 8]>::try_from(value).map(u64::from_be_bytes);
    let term = match (key.get(end + 1).copied().and_then(Type::from_code), fast) {
        (Some(Type::F64), Ok(v)) => decimal(tantivy::u64_to_f64(v)),
        (Some(Type::I64), Ok(v)) => tantivy::u64_to_i64(v).to_string(),
        (Some(Type::U64), Ok(v)) => v.to_string(),
        _ => String::from_utf8_lossy(value).into_owned(),
    };
    (path, term)
}
