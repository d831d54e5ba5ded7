//! Integration tests for Mercator spatial and text search
//!
//! These tests run against the public API only, on indexes stored in
//! temporary directories and filled from the fixture gazetteer.

use std::time::Duration;

use mercator::data_processing::test_data::{MINIMAL_PLACES, TestDataConfig, create_test_data};
use mercator::{
    BoundingBox, DocumentSearcher, ErrorKind, GazetteerIndexDef, IndexHandle, LatLon,
    MalformedRecordPolicy, MercatorConfig, PlaceSearcher, Submission, format_elapsed_ms,
};

fn setup_test_env() {
    let _ = mercator::init_logging(tracing::Level::WARN);
}

fn place_searcher(config: MercatorConfig) -> (tempfile::TempDir, PlaceSearcher) {
    let dir = tempfile::tempdir().expect("Should create index dir");
    let handle = IndexHandle::open(dir.path(), GazetteerIndexDef).expect("Should open index");
    let searcher = PlaceSearcher::with_config(handle, config).expect("Should create searcher");
    (dir, searcher)
}

#[test]
fn test_world_box_returns_every_located_record() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::builder().page_size(1_000).build().unwrap());
    let data = TestDataConfig::sample();
    let file = create_test_data(&data).unwrap();
    let report = searcher.index_record_file(file.path()).unwrap();
    assert_eq!(report.documents_written, data.row_count() as u64);

    let results = searcher.search_spatial("*", &BoundingBox::WORLD).unwrap();
    let located = MINIMAL_PLACES
        .iter()
        .filter(|p| p.lat.is_some() && p.lon.is_some())
        .count()
        + data.generated_rows;
    assert_eq!(results.len(), located);
    assert!(
        results
            .iter()
            .all(|r| BoundingBox::WORLD.contains(r.position))
    );
}

#[test]
fn test_box_is_inclusive_and_exclusive_where_expected() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::builder().page_size(1_000).build().unwrap());
    let file = create_test_data(&TestDataConfig::sample()).unwrap();
    searcher.index_record_file(file.path()).unwrap();

    let bounds = BoundingBox::new(LatLon::new(40.0, -75.0), LatLon::new(35.0, -70.0));
    let inside = searcher.search_spatial("*", &bounds).unwrap();
    assert!(inside.iter().all(|r| bounds.contains(r.position)));
    // Example Creek sits exactly on the north-west corner
    assert!(inside.iter().any(|r| r.label.contains("Example Creek")));

    let everything = searcher.search_spatial("*", &BoundingBox::WORLD).unwrap();
    let expected = everything
        .iter()
        .filter(|r| bounds.contains(r.position))
        .count();
    assert_eq!(inside.len(), expected);
}

#[test]
fn test_analyzed_name_match() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::default());
    let file = create_test_data(&TestDataConfig::minimal()).unwrap();
    searcher.index_record_file(file.path()).unwrap();

    let results = searcher.search_spatial("Example", &BoundingBox::WORLD).unwrap();
    assert!(results.iter().any(|r| r.label.contains("Mount Example")));

    // "Exampl" is not a term of the analyzed name
    let results = searcher.search_spatial("Exampl", &BoundingBox::WORLD).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_indexing_twice_duplicates_records() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::default());
    let file = create_test_data(&TestDataConfig::minimal()).unwrap();
    searcher.index_record_file(file.path()).unwrap();
    searcher.index_record_file(file.path()).unwrap();

    assert_eq!(searcher.num_docs().unwrap(), 2 * MINIMAL_PLACES.len() as u64);
    let results = searcher.search_spatial("Monument", &BoundingBox::WORLD).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn test_missing_latitude_only_found_by_name() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::default());
    let file = create_test_data(&TestDataConfig::minimal()).unwrap();
    searcher.index_record_file(file.path()).unwrap();

    let spatial = searcher.search_spatial("Lost", &BoundingBox::WORLD).unwrap();
    assert!(spatial.is_empty());

    let named = searcher.search_names("Lost").unwrap();
    assert_eq!(named.len(), 1);
    assert!(named[0].label.starts_with("1. Lost Spring"));
}

#[test]
fn test_malformed_record_policies() {
    setup_test_env();

    let file = create_test_data(&TestDataConfig::with_malformed()).unwrap();

    let (_dir, skipping) = place_searcher(MercatorConfig::default());
    let report = skipping.index_record_file(file.path()).unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.documents_written, MINIMAL_PLACES.len() as u64);

    let config = MercatorConfig::builder()
        .malformed_records(MalformedRecordPolicy::Abort)
        .build()
        .unwrap();
    let (_dir, aborting) = place_searcher(config);
    let err = aborting.index_record_file(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    // the only batch was in flight
    assert_eq!(aborting.num_docs().unwrap(), 0);
}

#[test]
fn test_query_syntax_errors_are_not_empty_results() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::default());
    let err = searcher
        .search_spatial("NO_SUCH_FIELD:x", &BoundingBox::WORLD)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuerySyntax);
}

#[test]
fn test_elapsed_formatting() {
    assert_eq!(format_elapsed_ms(500), "500 ms");
    assert_eq!(format_elapsed_ms(1500), "1.5 seconds");
    assert_eq!(
        format_elapsed_ms(65000),
        "1.0833333333333333 minutes, 5.0 seconds"
    );
}

#[test]
fn test_commit_visible_to_next_queued_search() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::default());
    let file = create_test_data(&TestDataConfig::minimal()).unwrap();

    let before = searcher
        .submit_search("Example", BoundingBox::WORLD)
        .accepted()
        .expect("Search should be queued");
    assert!(before.wait().unwrap().is_empty());

    let ingest = searcher
        .submit_index_record_file(file.path())
        .accepted()
        .expect("Ingest should be queued");
    ingest.wait().unwrap();

    let after = searcher
        .submit_search("Example", BoundingBox::WORLD)
        .accepted()
        .expect("Search should be queued");
    assert_eq!(after.wait().unwrap().len(), 2);
}

#[test]
fn test_overflowing_queue_rejects_instead_of_blocking() {
    setup_test_env();

    let config = MercatorConfig::builder().workers(1, 1).build().unwrap();
    let (_dir, searcher) = place_searcher(config);
    let rejections = searcher.subscribe_rejections();

    let submissions: Vec<_> = (0..50)
        .map(|i| searcher.submit_search(format!("Example{i}"), BoundingBox::WORLD))
        .collect();
    let rejected = submissions.iter().filter(|s| s.is_rejected()).count();
    assert!(rejected > 0, "a single worker with one slot cannot take 50 jobs at once");

    let events: Vec<_> = rejections.try_iter().collect();
    assert_eq!(events.len(), rejected);

    let mut newest = None;
    for submission in submissions {
        if let Submission::Accepted(ticket) = submission {
            if let Some(seen) = newest {
                assert!(ticket.sequence() > seen);
            }
            newest = Some(ticket.sequence());
            ticket.wait().unwrap();
        }
    }
}

#[test]
fn test_document_directory_search() {
    setup_test_env();

    let index_dir = tempfile::tempdir().unwrap();
    let docs = tempfile::tempdir().unwrap();
    std::fs::write(docs.path().join("a.txt"), "A survey of the river delta").unwrap();
    std::fs::write(docs.path().join("b.txt"), "Mountain passes and river crossings").unwrap();
    std::fs::create_dir(docs.path().join("nested")).unwrap();
    std::fs::write(docs.path().join("nested/c.txt"), "Desert wells").unwrap();
    std::fs::write(docs.path().join("scan.bin"), b"\0\x01\x02").unwrap();

    let searcher = DocumentSearcher::open(index_dir.path()).unwrap();
    let report = searcher.index_document_dir(docs.path()).unwrap();
    assert_eq!(report.documents_written, 3);
    assert_eq!(report.skipped.len(), 1);

    let results = searcher.search_text("river", false).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.html.contains("<b>river</b>")));

    let explained = searcher.search_text("wells", true).unwrap();
    assert_eq!(explained.len(), 1);
    assert!(explained[0].html.contains("<b>name: </b>c.txt<br/>"));
    assert!(explained[0].explanation.is_some());

    let entries: Vec<_> = searcher
        .list_vocabulary()
        .filter(|e| e.field == "contents" && e.term == "river")
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].doc_freq, 2);
}

#[test]
fn test_non_gnis_columns_are_indexed_under_their_header() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::default());
    let input = tempfile::tempdir().unwrap();
    let file = input.path().join("peaks.txt");
    std::fs::write(
        &file,
        "FEATURE_NAME|ELEVATION|BGN_FEATURE_CLASS|LAT_DEC\nPeak|1234|Summit|40.5\n",
    )
    .unwrap();
    searcher.index_record_file(&file).unwrap();

    let fields: std::collections::BTreeSet<_> =
        searcher.list_vocabulary().map(|e| e.field).collect();
    for expected in ["FEATURE_NAME", "ELEVATION", "BGN_FEATURE_CLASS", "LAT_DEC"] {
        assert!(fields.contains(expected), "{expected} missing from {fields:?}");
    }
}

#[test]
fn test_long_running_ingest_does_not_block_submissions() {
    setup_test_env();

    let (_dir, searcher) = place_searcher(MercatorConfig::default());
    let file = create_test_data(&TestDataConfig::sample()).unwrap();
    let ingest = searcher
        .submit_index_record_file(file.path())
        .accepted()
        .unwrap();

    let started = std::time::Instant::now();
    let search = searcher.submit_search("Generated", BoundingBox::WORLD);
    assert!(started.elapsed() < Duration::from_secs(1));

    ingest.wait().unwrap();
    if let Some(ticket) = search.accepted() {
        ticket.wait().unwrap();
    }
}
