//! Place search over the gazetteer index.
use std::time::Instant;

use tantivy::TantivyDocument;
use tantivy::collector::TopDocs;
use tantivy::query::Query;
use tantivy::schema::{Field, Value};
use tracing::{debug, instrument};

use super::query::{BoundingBox, LatLon, spatial_query, text_query};
use crate::config::MercatorConfig;
use crate::error::Result;
use crate::index::{IndexHandle, gazetteer_fields};
use crate::timing::{decimal, format_elapsed};

/// One place hit, ready for display.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoResult {
    /// Primary coordinates, `(0, 0)` when the record has none.
    pub position: LatLon,
    /// `"<rank>. <name>, <county>/<state> (<class>), Map: <map>(<lat>, <lon>)"`
    pub label: String,
}

impl std::fmt::Display for GeoResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

struct PlaceFields {
    name: Field,
    class: Field,
    state: Field,
    county: Field,
    map: Field,
    lat: Field,
    lon: Field,
}

impl PlaceFields {
    fn resolve(handle: &IndexHandle) -> Result<Self> {
        Ok(Self {
            name: handle.field(gazetteer_fields::FEATURE_NAME)?,
            class: handle.field(gazetteer_fields::FEATURE_CLASS)?,
            state: handle.field(gazetteer_fields::STATE_ALPHA)?,
            county: handle.field(gazetteer_fields::COUNTY_NAME)?,
            map: handle.field(gazetteer_fields::MAP_NAME)?,
            lat: handle.field(gazetteer_fields::PRIM_LAT_DEC)?,
            lon: handle.field(gazetteer_fields::PRIM_LONG_DEC)?,
        })
    }

    fn project(&self, rank: usize, doc: &TantivyDocument) -> GeoResult {
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
        };
        let lat = doc.get_first(self.lat).and_then(|v| v.as_f64());
        let lon = doc.get_first(self.lon).and_then(|v| v.as_f64());
        let (position, coords) = match (lat, lon) {
            (Some(lat), Some(lon)) => (
                LatLon::new(lat, lon),
                format!("({}, {})", decimal(lat), decimal(lon)),
            ),
            _ => (LatLon::default(), String::new()),
        };
        let label = format!(
            "{rank}. {}, {}/{} ({}), Map: {}{coords}",
            text(self.name),
            text(self.county),
            text(self.state),
            text(self.class),
            text(self.map),
        );
        GeoResult { position, label }
    }
}

/// Places whose `FEATURE_NAME` matches `query` and whose primary coordinates
/// fall inside `bounds`, best first, at most `page_size` of them.
#[instrument(name = "Spatial Search", skip(handle, config), level = "debug")]
pub fn search_spatial(
    handle: &IndexHandle,
    query: &str,
    bounds: &BoundingBox,
    config: &MercatorConfig,
) -> Result<Vec<GeoResult>> {
    let query = spatial_query(handle, query, bounds)?;
    run(handle, query.as_ref(), config)
}

/// Places whose `FEATURE_NAME` matches `query`, wherever they are. Places
/// without coordinates are included at `(0, 0)`.
#[instrument(name = "Place Name Search", skip(handle, config), level = "debug")]
pub fn search_names(
    handle: &IndexHandle,
    query: &str,
    config: &MercatorConfig,
) -> Result<Vec<GeoResult>> {
    let name = handle.field(gazetteer_fields::FEATURE_NAME)?;
    let query = text_query(handle, name, query)?;
    run(handle, query.as_ref(), config)
}

fn run(handle: &IndexHandle, query: &dyn Query, config: &MercatorConfig) -> Result<Vec<GeoResult>> {
    let started = Instant::now();
    let fields = PlaceFields::resolve(handle)?;
    let searcher = handle.snapshot()?;
    let top_docs = searcher.search(query, &TopDocs::with_limit(config.page_limit()))?;

    let results = top_docs
        .into_iter()
        .enumerate()
        .map(|(i, (_score, address))| {
            let doc = searcher.doc::<TantivyDocument>(address)?;
            Ok(fields.project(i + 1, &doc))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        num_results = results.len(),
        "Place search took {}",
        format_elapsed(started.elapsed())
    );
    Ok(results)
}
