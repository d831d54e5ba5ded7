//! Term dictionary dump
//!
//! Lists every `(field, term, doc freq)` of a freshly built gazetteer index.
//! The listing is lazy, so taking a few entries only reads the first field.

use mercator::data_processing::test_data::{TestDataConfig, create_test_data};
use mercator::PlaceSearcher;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    mercator::init_logging(tracing::Level::WARN)?;

    let index_dir = tempfile::tempdir()?;
    let searcher = PlaceSearcher::open(index_dir.path())?;
    let fixture = create_test_data(&TestDataConfig::minimal())?;
    searcher.index_record_file(fixture.path())?;

    for entry in searcher.list_vocabulary().take(20) {
        println!("{entry}");
    }

    let names = searcher
        .list_vocabulary()
        .filter(|e| e.field == "FEATURE_NAME")
        .count();
    println!("\n{names} distinct terms in FEATURE_NAME");

    Ok(())
}
