use docbench::Database;
use docbench::document::Value;
use docbench::import::{self, ImportOptions};
use docbench::synth::{self, SynthSpec};
use docbench::workload::{self, JOINED, USER_VISITS, WorkloadOptions};

fn revenue(f: &docbench::document::Fields) -> f64 {
    f.get("totalRevenue").and_then(Value::as_number).map(|n| n.as_f64()).unwrap()
}

/// The tiny data set, written to CSV and read back through the importer.
fn tiny() -> Database {
    let dir = tempfile::tempdir().unwrap();
    let data = synth::generate(2013, &SynthSpec::tiny()).unwrap();
    let (rankings, visits) = synth::write_csv(dir.path(), &data).unwrap();
    let db = Database::new();
    import::import_rankings(&db, &[rankings], &ImportOptions::default()).unwrap();
    import::import_uservisits(&db, &[visits], &ImportOptions::default()).unwrap();
    db
}

#[test]
fn scenario_a_scan_counts() {
    let db = tiny();
    assert_eq!(workload::scan_query(&db, 1000).unwrap(), 0);
    assert_eq!(workload::scan_query(&db, 100).unwrap(), 45);
    assert_eq!(workload::scan_query(&db, 10).unwrap(), 1200);
}

#[test]
fn scenario_b_grouped_revenue() {
    let db = tiny();
    let total: f64 = db
        .collection(USER_VISITS)
        .unwrap()
        .scan()
        .unwrap()
        .map(|d| d.get("adRevenue").and_then(Value::as_number).unwrap().as_f64())
        .sum();
    for prefix in [7, 9, 11] {
        let groups = workload::aggregation_query(&db, prefix).unwrap();
        assert_eq!(groups.len(), 5);
        assert!(groups.iter().all(|g| g.get("sourceIP_group").is_some()));
        let sum: f64 = groups.iter().map(revenue).sum();
        assert!(sum <= total + 1e-6, "{sum} > {total}");
    }
    // fresh pipelines per call: repeated runs agree
    assert_eq!(workload::aggregation_query(&db, 7).unwrap(), workload::aggregation_query(&db, 7).unwrap());
}

#[test]
fn scenario_c_join_then_aggregate() {
    let db = tiny();
    let joined = workload::prejoin(&db).unwrap();
    assert_eq!(joined.len(), 10_000);
    assert_eq!(db.count(JOINED, None).unwrap(), 10_000);
    let mut last = f64::NEG_INFINITY;
    for upper in ["1980-04-01", "1983-04-01", "2010-04-01"] {
        let top = workload::join_query(&db, upper).unwrap();
        assert_eq!(top.len(), 1);
        let doc = &top[0];
        assert!(doc.get("avgPageRank").is_some());
        let first = doc.get("visitDate").and_then(Value::as_text).unwrap();
        assert!(first > "1980-01-01" && first < upper);
        let rev = revenue(doc);
        assert!(rev >= last);
        last = rev;
    }
}

#[test]
fn full_run_reports_every_query() {
    let db = tiny();
    let report = workload::run_all(&db, &WorkloadOptions::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scan"][1]["count"], 45);
    assert_eq!(json["aggregation"].as_array().unwrap().len(), 3);
    assert_eq!(json["join"][2]["upper_date"], "2010-04-01");
}
