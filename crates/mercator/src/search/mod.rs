//! Query composition and result projection.
//!
//! Every search opens its own index snapshot and releases it before
//! returning, so results always reflect the latest commit.

pub mod highlight;
pub mod query;
pub mod spatial;
pub mod text;

pub use highlight::Highlighter;
pub use query::{BoundingBox, LatLon};
pub use spatial::{GeoResult, search_names, search_spatial};
pub use text::{RenderedResult, search_text};
