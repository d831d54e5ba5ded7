//! Full-text document search rendered as HTML snippets.
use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use mercator_data_processing::processed::text_fields;
use tantivy::collector::TopDocs;
use tantivy::query::Query;
use tantivy::schema::{Field, Value};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{DocAddress, Searcher, TantivyDocument};
use tracing::{debug, instrument, warn};

use super::highlight::{Highlighter, escape_html};
use super::query::text_query;
use crate::config::MercatorConfig;
use crate::error::Result;
use crate::index::IndexHandle;
use crate::timing::format_elapsed;

/// Stored fields listed by the explain rendering, in order.
pub const EXPLAIN_FIELDS: [&str; 3] = [text_fields::NAME, text_fields::PATH, text_fields::SUMMARY];

/// One document hit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderedResult {
    pub score: f32,
    pub path: Option<String>,
    /// Highlighted fragments of `contents`, best first. Empty when
    /// highlighting failed.
    pub fragments: Vec<String>,
    /// Scoring breakdown as JSON, explain mode only.
    pub explanation: Option<String>,
    pub html: String,
}

impl fmt::Display for RenderedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html)
    }
}

/// Documents whose `contents` match `query`, best first, at most
/// `page_size` of them.
///
/// With `explain` set, every result also lists its `name`, `path` and
/// `summary`, the raw score and the engine's scoring breakdown.
#[instrument(name = "Text Search", skip(handle, config), level = "debug")]
pub fn search_text(
    handle: &IndexHandle,
    query: &str,
    explain: bool,
    config: &MercatorConfig,
) -> Result<Vec<RenderedResult>> {
    let started = Instant::now();
    let contents = handle.field(text_fields::CONTENTS)?;
    let query = text_query(handle, contents, query)?;

    let searcher = handle.snapshot()?;
    let top_docs = searcher.search(query.as_ref(), &TopDocs::with_limit(config.page_limit()))?;

    let renderer = Renderer {
        searcher: &searcher,
        query: query.as_ref(),
        contents,
        analyzer: analyzer_for_highlight(handle, contents),
        terms: Highlighter::query_terms(query.as_ref(), contents),
        highlighter: Highlighter::from_config(config),
        explain,
    };
    let results = top_docs
        .into_iter()
        .map(|(score, address)| renderer.render(handle, score, address))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        num_results = results.len(),
        explain,
        "Text search took {}",
        format_elapsed(started.elapsed())
    );
    Ok(results)
}

fn analyzer_for_highlight(handle: &IndexHandle, contents: Field) -> Option<TextAnalyzer> {
    match handle.analyzer(contents) {
        Ok(analyzer) => Some(analyzer),
        Err(e) => {
            warn!(error = %e, "No analyzer for highlighting, results are not highlighted");
            None
        }
    }
}

struct Renderer<'a> {
    searcher: &'a Searcher,
    query: &'a dyn Query,
    contents: Field,
    analyzer: Option<TextAnalyzer>,
    terms: HashSet<String>,
    highlighter: Highlighter,
    explain: bool,
}

impl Renderer<'_> {
    fn render(&self, handle: &IndexHandle, score: f32, address: DocAddress) -> Result<RenderedResult> {
        let doc = self.searcher.doc::<TantivyDocument>(address)?;
        let stored = |name: &str| {
            handle
                .field(name)
                .ok()
                .and_then(|field| doc.get_first(field))
                .and_then(|v| v.as_str())
        };
        let path = stored(text_fields::PATH).map(str::to_owned);
        let contents = doc.get_first(self.contents).and_then(|v| v.as_str());
        let fragments = contents.map(|text| self.highlight(text)).unwrap_or_default();

        let mut html = String::from("<html>");
        let mut explanation = None;
        if self.explain {
            for name in EXPLAIN_FIELDS {
                if let Some(value) = stored(name) {
                    push_field(&mut html, name, value);
                }
            }
            let json = self.query.explain(self.searcher, address)?.to_pretty_json();
            html.push_str(&format!("<b>Score: </b>: {score}<br/>"));
            html.push_str("Explanation:<br/><pre>");
            html.push_str(&escape_html(&json));
            html.push_str("</pre>");
            explanation = Some(json);
        } else if let Some(path) = &path {
            push_field(&mut html, text_fields::PATH, path);
        }
        if contents.is_some() {
            html.push_str("<b>Matches:</b><br/>");
            for fragment in &fragments {
                html.push_str(fragment);
                html.push_str("<br/>");
            }
        }
        html.push_str("</html>");

        Ok(RenderedResult {
            score,
            path,
            fragments,
            explanation,
            html,
        })
    }

    fn highlight(&self, text: &str) -> Vec<String> {
        let Some(analyzer) = &self.analyzer else {
            return Vec::new();
        };
        match self.highlighter.best_fragments(analyzer, text, &self.terms) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(error = %e, "Highlighting failed, showing result without matches");
                Vec::new()
            }
        }
    }
}

fn push_field(html: &mut String, name: &str, value: &str) {
    html.push_str("<b>");
    html.push_str(name);
    html.push_str(": </b>");
    html.push_str(&escape_html(value));
    html.push_str("<br/>");
}
