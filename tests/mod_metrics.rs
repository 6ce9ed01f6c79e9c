use docbench::Database;
use docbench::document::Fields;
use docbench::index::IndexOrder;
use docbench::join::JoinSpec;
use docbench::utils::logger::configure_logging;

// Installs the process-wide logger, so this file holds a single test.
#[test]
fn index_builds_and_join_cache_stats_reach_metrics_log() {
    let dir = tempfile::tempdir().unwrap();
    configure_logging(Some(dir.path()), Some("info"), Some(2)).unwrap();

    let db = Database::new();
    db.insert_many("rankings", (0..4).map(|i| Fields::new().with("pageURL", format!("u{i}")).with("pageRank", i)))
        .unwrap();
    db.insert_many("userVisits", (0..10).map(|i| Fields::new().with("destURL", format!("u{}", i % 2)))).unwrap();
    db.ensure_index("rankings", "pageRank", IndexOrder::Asc).unwrap();
    db.materialize_join("userVisits", "rankings", &JoinSpec::new("pageURL", "destURL"), "joined").unwrap();
    log::logger().flush();

    let metrics = std::fs::read_to_string(dir.path().join("metrics.log")).unwrap();
    assert!(metrics.contains("index rankings.pageRank entries=4"), "{metrics}");
    assert!(metrics.contains("join userVisits->joined documents=10 key_cache_hits=8 key_cache_misses=2"), "{metrics}");
    let app = std::fs::read_to_string(dir.path().join("app.log")).unwrap();
    assert!(!app.contains("key_cache_hits"));
}
