//! Query-term highlighting over stored text.
//!
//! The text is re-tokenized with the analyzer of its field so that matches
//! line up with what the index saw. The text is cut into fragments of
//! roughly `fragment_size` characters at token starts, each fragment is scored by
//! the number of distinct query terms it contains, and the best ones are
//! rendered as HTML with matches in `<b>`.
use std::collections::HashSet;
use std::ops::Range;

use itertools::Itertools;
use tantivy::query::Query;
use tantivy::schema::Field;
use tantivy::tokenizer::{TextAnalyzer, TokenStream};

use crate::config::MercatorConfig;
use crate::error::{MercatorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlighter {
    fragment_size: usize,
    max_fragments: usize,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(30, 10)
    }
}

#[derive(Debug)]
struct Fragment {
    span: Range<usize>,
    matches: Vec<Range<usize>>,
    terms: HashSet<String>,
}

impl Fragment {
    fn starting_at(start: usize) -> Self {
        Self {
            span: start..start,
            matches: Vec::new(),
            terms: HashSet::new(),
        }
    }

    fn score(&self) -> f32 {
        self.terms.len() as f32
    }
}

impl Highlighter {
    pub fn new(fragment_size: usize, max_fragments: usize) -> Self {
        Self {
            fragment_size: fragment_size.max(1),
            max_fragments,
        }
    }

    pub fn from_config(config: &MercatorConfig) -> Self {
        Self::new(config.fragment_size, config.max_fragments)
    }

    /// Indexed terms of `query` that target `field`.
    pub fn query_terms(query: &dyn Query, field: Field) -> HashSet<String> {
        let mut terms = HashSet::new();
        query.query_terms(&mut |term, _| {
            if term.field() == field
                && let Some(text) = term.value().as_str()
            {
                terms.insert(text.to_owned());
            }
        });
        terms
    }

    /// Best scoring fragments of `text`, best first, as HTML.
    ///
    /// Fragments without any matched term are never returned. Fails with
    /// [`MercatorError::HighlightComputation`] when the analyzer reports
    /// offsets that do not fit the text.
    pub fn best_fragments(
        &self,
        analyzer: &TextAnalyzer,
        text: &str,
        terms: &HashSet<String>,
    ) -> Result<Vec<String>> {
        if terms.is_empty() || text.is_empty() || self.max_fragments == 0 {
            return Ok(Vec::new());
        }

        let mut fragments = vec![Fragment::starting_at(0)];
        let mut chars = CharOffsets::new(text);
        let mut analyzer = analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        while let Some(token) = stream.next() {
            let span = token.offset_from..token.offset_to;
            if span.start > span.end
                || span.end > text.len()
                || !text.is_char_boundary(span.start)
                || !text.is_char_boundary(span.end)
            {
                return Err(MercatorError::HighlightComputation(format!(
                    "token {:?} has offsets {span:?} outside of a {} byte text",
                    token.text,
                    text.len()
                )));
            }

            let current_start = fragments.last().map_or(0, |f| f.span.start);
            if span.start > current_start
                && chars.at(span.start) >= self.fragment_size * fragments.len()
            {
                if let Some(current) = fragments.last_mut() {
                    current.span.end = span.start;
                }
                fragments.push(Fragment::starting_at(span.start));
            }
            if terms.contains(&token.text)
                && let Some(current) = fragments.last_mut()
            {
                current.matches.push(span);
                current.terms.insert(token.text.clone());
            }
        }
        if let Some(last) = fragments.last_mut() {
            last.span.end = text.len();
        }

        fragments
            .into_iter()
            .filter(|f| f.score() > 0.0)
            .sorted_by(|a, b| b.score().total_cmp(&a.score()))
            .take(self.max_fragments)
            .map(|fragment| render_fragment(text, &fragment))
            .collect()
    }
}

/// Character offset of byte positions, counted incrementally for tokens
/// arriving in text order.
struct CharOffsets<'a> {
    text: &'a str,
    byte: usize,
    chars: usize,
}

impl<'a> CharOffsets<'a> {
    const fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            chars: 0,
        }
    }

    /// `byte` must be a char boundary.
    fn at(&mut self, byte: usize) -> usize {
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += self.text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

/// Renders one fragment with its matches in `<b>`.
///
/// A match overlapping the previous one is skipped and a match running past
/// the fragment end is cut at the end.
fn render_fragment(text: &str, fragment: &Fragment) -> Result<String> {
    let slice = |range: Range<usize>| {
        text.get(range.clone()).ok_or_else(|| {
            MercatorError::HighlightComputation(format!(
                "fragment range {range:?} does not fit a {} byte text",
                text.len()
            ))
        })
    };
    let end = fragment.span.end;
    let mut out = String::new();
    let mut cursor = fragment.span.start;
    for m in &fragment.matches {
        if m.start < cursor || m.start >= end {
            continue;
        }
        let match_end = m.end.min(end);
        out.push_str(&escape_html(slice(cursor..m.start)?));
        out.push_str("<b>");
        out.push_str(&escape_html(slice(m.start..match_end)?));
        out.push_str("</b>");
        cursor = match_end;
    }
    out.push_str(&escape_html(slice(cursor..end)?));
    Ok(out.trim().to_owned())
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DocumentIndexDef, IndexHandle};
    use crate::search::query::text_query;
    use mercator_data_processing::processed::text_fields;
    use tantivy::tokenizer::NgramTokenizer;

    fn terms(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| (*w).to_owned()).collect()
    }

    fn analyzer() -> TextAnalyzer {
        let handle = IndexHandle::create_in_ram(DocumentIndexDef);
        let contents = handle.field(text_fields::CONTENTS).unwrap();
        handle.analyzer(contents).unwrap()
    }

    #[test]
    fn test_query_terms_are_analyzed_and_field_scoped() {
        let handle = IndexHandle::create_in_ram(DocumentIndexDef);
        let contents = handle.field(text_fields::CONTENTS).unwrap();
        let query = text_query(&handle, contents, "River AND title:Survey").unwrap();

        assert_eq!(Highlighter::query_terms(query.as_ref(), contents), terms(&["river"]));
    }

    #[test]
    fn test_matches_are_bold_and_case_preserved() {
        let fragments = Highlighter::default()
            .best_fragments(&analyzer(), "The River flows", &terms(&["river"]))
            .unwrap();
        assert_eq!(fragments, vec!["The <b>River</b> flows"]);
    }

    #[test]
    fn test_fragments_ranked_by_distinct_terms() {
        // fragments start at bytes 0, 30 ("six") and 62 (second "alpha")
        let text = "alpha one two three four five six seven eight nine ten eleven alpha beta twelve";
        let fragments = Highlighter::new(30, 10)
            .best_fragments(&analyzer(), text, &terms(&["alpha", "beta"]))
            .unwrap();

        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].contains("<b>alpha</b> <b>beta</b>"), "{fragments:?}");
        assert!(fragments[1].starts_with("<b>alpha</b> one"), "{fragments:?}");
    }

    #[test]
    fn test_fragment_count_is_capped() {
        let text = "match ".repeat(100);
        let fragments = Highlighter::new(30, 10)
            .best_fragments(&analyzer(), &text, &terms(&["match"]))
            .unwrap();
        assert_eq!(fragments.len(), 10);
    }

    #[test]
    fn test_no_terms_no_fragments() {
        let fragments = Highlighter::default()
            .best_fragments(&analyzer(), "nothing to see", &terms(&["absent"]))
            .unwrap();
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_fragment_size_counts_characters() {
        // ten two-byte letters put "river" at byte 21 but character 11
        let text = "ääääääääää river";
        let fragments = Highlighter::new(15, 10)
            .best_fragments(&analyzer(), text, &terms(&["river"]))
            .unwrap();
        assert_eq!(fragments, vec!["ääääääääää <b>river</b>"]);
    }

    #[test]
    fn test_match_crossing_fragment_end_is_cut() {
        let fragment = Fragment {
            span: 0..5,
            matches: vec![1..3, 2..4, 3..9],
            terms: terms(&["bc", "de"]),
        };
        assert_eq!(render_fragment("abcdefghij", &fragment).unwrap(), "a<b>bc</b><b>de</b>");
    }

    #[test]
    fn test_overlapping_ngram_tokens_do_not_panic() {
        let mut ngrams = TextAnalyzer::from(NgramTokenizer::new(2, 3, false).unwrap());
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(3);
        let fragments = Highlighter::new(5, 10)
            .best_fragments(&ngrams, &text, &terms(&["efg", "mn"]))
            .unwrap();
        assert!(!fragments.is_empty());
        assert!(fragments.iter().all(|f| f.contains("<b>")));
        // the analyzer is cloned, the caller's instance stays usable
        assert!(ngrams.token_stream("ab").next().is_some());
    }

    #[test]
    fn test_text_is_escaped() {
        let fragments = Highlighter::default()
            .best_fragments(&analyzer(), "a < b & river", &terms(&["river"]))
            .unwrap();
        assert_eq!(fragments, vec!["a &lt; b &amp; <b>river</b>"]);
    }
}
