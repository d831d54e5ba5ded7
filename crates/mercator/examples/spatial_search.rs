//! Bounding-box place search
//!
//! This example demonstrates:
//! - Indexing a `|`-delimited gazetteer file
//! - Searching place names inside a bounding box
//! - Finding places that have no coordinates by name only
//!
//! Pass a GNIS file as the first argument, or run without arguments to use
//! the bundled fixture rows.

use mercator::data_processing::test_data::{TestDataConfig, create_test_data};
use mercator::{BoundingBox, GeoResult, LatLon, PlaceSearcher};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    mercator::init_logging(tracing::Level::INFO)?;

    let index_dir = tempfile::tempdir()?;
    let searcher = PlaceSearcher::open(index_dir.path())?;

    // Keep the fixture alive until indexing is done
    let fixture = create_test_data(&TestDataConfig::sample())?;
    let source = std::env::args()
        .nth(1)
        .map_or_else(|| fixture.path().to_path_buf(), Into::into);

    let report = searcher.index_record_file(&source)?;
    println!(
        "Indexed {} places ({} skipped)",
        report.documents_written,
        report.skipped.len()
    );

    // Roughly Pennsylvania to the Carolinas
    let bounds = BoundingBox::new(LatLon::new(40.0, -82.0), LatLon::new(35.0, -75.0));
    println!("\nCreeks inside {bounds:?}:");
    print_results(&searcher.search_spatial("creek", &bounds)?, 5);

    println!("\nEverything named 'Example', anywhere:");
    print_results(&searcher.search_spatial("Example", &BoundingBox::WORLD)?, 5);

    println!("\n'Lost Spring' has no latitude, so only a name search finds it:");
    print_results(&searcher.search_names("\"Lost Spring\"")?, 5);

    Ok(())
}

fn print_results(results: &[GeoResult], limit: usize) {
    for result in results.iter().take(limit) {
        println!("  {result}");
    }
    if results.len() > limit {
        println!("  ... and {} more results", results.len() - limit);
    }
}
