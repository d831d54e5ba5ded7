//! Query composition: free text, optionally restricted to a bounding box.
use std::ops::{Bound, RangeInclusive};

use tantivy::Term;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, RangeQuery};
use tantivy::schema::Field;
use tracing::{trace, warn};

use crate::error::Result;
use crate::index::{IndexHandle, gazetteer_fields};

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Area between a north-west and a south-east corner, edges included.
///
/// Longitudes must satisfy west <= east; boxes crossing the antimeridian
/// are not supported and match nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub north_west: LatLon,
    pub south_east: LatLon,
}

impl BoundingBox {
    /// The whole globe.
    pub const WORLD: Self = Self::new(LatLon::new(90.0, -180.0), LatLon::new(-90.0, 180.0));

    pub const fn new(north_west: LatLon, south_east: LatLon) -> Self {
        Self {
            north_west,
            south_east,
        }
    }

    /// `[south, north]`
    pub const fn lat_range(&self) -> RangeInclusive<f64> {
        self.south_east.lat..=self.north_west.lat
    }

    /// `[west, east]`
    pub const fn lon_range(&self) -> RangeInclusive<f64> {
        self.north_west.lon..=self.south_east.lon
    }

    pub fn contains(&self, point: LatLon) -> bool {
        self.lat_range().contains(&point.lat) && self.lon_range().contains(&point.lon)
    }
}

/// Parses `query` against `field` with default relevance scoring.
///
/// A syntax error is returned as is; it never turns into an empty query.
pub fn text_query(handle: &IndexHandle, field: Field, query: &str) -> Result<Box<dyn Query>> {
    let parser = QueryParser::for_index(handle.index(), vec![field]);
    let parsed = parser.parse_query(query)?;
    trace!(?parsed, "Parsed text query");
    Ok(parsed)
}

/// Inclusive range over a numeric field.
pub fn range_filter(field: Field, range: &RangeInclusive<f64>) -> RangeQuery {
    RangeQuery::new(
        Bound::Included(Term::from_field_f64(field, *range.start())),
        Bound::Included(Term::from_field_f64(field, *range.end())),
    )
}

/// Free text on `FEATURE_NAME` AND latitude in the box AND longitude in the
/// box. Documents without a primary latitude or longitude never match.
pub fn spatial_query(
    handle: &IndexHandle,
    query: &str,
    bounds: &BoundingBox,
) -> Result<Box<dyn Query>> {
    let name = handle.field(gazetteer_fields::FEATURE_NAME)?;
    let lat = handle.field(gazetteer_fields::PRIM_LAT_DEC)?;
    let lon = handle.field(gazetteer_fields::PRIM_LONG_DEC)?;

    let lat_range = bounds.lat_range();
    let lon_range = bounds.lon_range();
    if lat_range.is_empty() || lon_range.is_empty() {
        warn!(?bounds, "Bounding box is inverted and matches nothing");
    }

    let text = text_query(handle, name, query)?;
    let clauses: Vec<(Occur, Box<dyn Query>)> = vec![
        (Occur::Must, text),
        (Occur::Must, Box::new(range_filter(lat, &lat_range))),
        (Occur::Must, Box::new(range_filter(lon, &lon_range))),
    ];
    let composed = BooleanQuery::new(clauses);
    trace!(?composed, "Composed spatial query");
    Ok(Box::new(composed))
}
