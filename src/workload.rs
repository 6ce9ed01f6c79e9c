//! The three Big Data Benchmark queries, with the fixture checks of the
//! reference scripts.

use bson::doc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::Database;
use crate::collection::Collection;
use crate::document::{Fields, Value};
use crate::errors::DbError;
use crate::index::IndexOrder;
use crate::join::JoinSpec;
use crate::pipeline::{GroupSpec, Pipeline, ProjectSpec};
use crate::query::Predicate;

pub const RANKINGS: &str = "rankings";
pub const USER_VISITS: &str = "userVisits";
pub const JOINED: &str = "rankingsAndUserVisits";

pub const TINY_RANKINGS: usize = 1200;
pub const TINY_USER_VISITS: usize = 10_000;

/// `(pageRank threshold, expected count)` over the tiny data set.
pub const SCAN_SWEEP: [(i64, usize); 3] = [(1000, 0), (100, 45), (10, 1200)];
pub const PREFIX_SWEEP: [usize; 3] = [7, 9, 11];
pub const UPPER_DATE_SWEEP: [&str; 3] = ["1980-04-01", "1983-04-01", "2010-04-01"];
pub const LOWER_DATE: &str = "1980-01-01";
const GROUP_LIMIT: usize = 5;

/// Query 1: `count({pageRank: {$gt: threshold}})` over an index on pageRank.
///
/// # Errors
/// `NoSuchCollection` if rankings are not loaded.
pub fn scan_query(db: &Database, threshold: i64) -> Result<usize, DbError> {
    db.ensure_index(RANKINGS, "pageRank", IndexOrder::Asc)?;
    db.count(RANKINGS, Some(&Predicate::new().gt("pageRank", threshold)))
}

/// Query 2: ad revenue grouped by the first `prefix_len` characters of sourceIP.
///
/// # Errors
/// `NoSuchCollection`, or a `Pipeline` error if adRevenue is not numeric.
pub fn aggregation_query(db: &Database, prefix_len: usize) -> Result<Vec<Fields>, DbError> {
    db.ensure_index(USER_VISITS, "sourceIP", IndexOrder::Asc)?;
    let pipeline = Pipeline::builder()
        .project(ProjectSpec::new().include("adRevenue").substr("sourceIP_group", "sourceIP", 0, prefix_len))
        .group(GroupSpec::by_field("sourceIP_group").sum("totalRevenue", "adRevenue"))
        .project(ProjectSpec::new().rename("sourceIP_group", "_id").include("totalRevenue"))
        .limit(GROUP_LIMIT)
        .build()?;
    db.aggregate(USER_VISITS, &pipeline)
}

/// Rebuilds the pre-joined collection: every visit plus its page's pageRank.
///
/// # Errors
/// `MissingJoinKey` if a visit points at an unknown page.
pub fn prejoin(db: &Database) -> Result<Arc<Collection>, DbError> {
    db.ensure_index(RANKINGS, "pageURL", IndexOrder::Asc)?;
    db.drop_collection(JOINED);
    let spec = JoinSpec::new("pageURL", "destURL").carry("pageRank", "pageRank");
    let joined = db.materialize_join(USER_VISITS, RANKINGS, &spec, JOINED)?;
    joined.ensure_index("visitDate", IndexOrder::Asc)?;
    Ok(joined)
}

/// Query 3 over the pre-joined collection: the source IP with the highest
/// revenue among visits strictly between 1980-01-01 and `upper_date`.
///
/// # Errors
/// `Pipeline` errors, e.g. when `upper_date` is not a `YYYY-MM-DD` date.
pub fn join_query(db: &Database, upper_date: &str) -> Result<Vec<Fields>, DbError> {
    if Value::date(upper_date).is_err() {
        return Err(DbError::validation("join query", format!("{upper_date:?} is not a YYYY-MM-DD date")).at_stage(0));
    }
    let stages = vec![
        doc! { "$match": { "visitDate": { "$gt": LOWER_DATE, "$lt": upper_date } } },
        doc! { "$group": {
            "_id": "$sourceIP",
            "totalRevenue": { "$sum": "$adRevenue" },
            "avgPageRank": { "$avg": "$pageRank" },
            "visitDate": { "$first": "$visitDate" }
        } },
        doc! { "$sort": { "totalRevenue": -1 } },
        doc! { "$limit": 1 },
    ];
    db.aggregate(JOINED, &Pipeline::from_bson(&stages)?)
}

/// Fails unless `collection` holds exactly `expected` documents.
///
/// # Errors
/// `CheckFailed` on a mismatch, `NoSuchCollection` if it does not exist.
pub fn expect_count(db: &Database, collection: &str, expected: usize) -> Result<(), DbError> {
    let actual = db.count(collection, None)?;
    if actual == expected {
        Ok(())
    } else {
        Err(DbError::CheckFailed(format!("{collection}.count() returns {actual}, should be {expected}")))
    }
}

fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<(), DbError> {
    if ok { Ok(()) } else { Err(DbError::CheckFailed(msg())) }
}

fn revenue(f: &Fields) -> f64 {
    f.get("totalRevenue").and_then(Value::as_number).map_or(0.0, |n| n.as_f64())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySet {
    pub scan: bool,
    pub aggregation: bool,
    pub join: bool,
}

impl QuerySet {
    pub const ALL: Self = Self { scan: true, aggregation: true, join: true };

    /// Parses `1`, `2`, `3` or `all`.
    ///
    /// # Errors
    /// `Validation` for anything else.
    pub fn parse(s: &str) -> Result<Self, DbError> {
        let none = Self { scan: false, aggregation: false, join: false };
        match s.trim() {
            "1" => Ok(Self { scan: true, ..none }),
            "2" => Ok(Self { aggregation: true, ..none }),
            "3" => Ok(Self { join: true, ..none }),
            "all" => Ok(Self::ALL),
            other => Err(DbError::validation("query selection", format!("expected 1, 2, 3 or all, got {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadOptions {
    pub queries: QuerySet,
    /// Skip the fixture assertions; for data sets other than "tiny".
    pub skip_checks: bool,
}

impl Default for WorkloadOptions {
    fn default() -> Self {
        Self { queries: QuerySet::ALL, skip_checks: false }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub threshold: i64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    pub prefix_len: usize,
    pub groups: Vec<Fields>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinResult {
    pub upper_date: String,
    pub top: Vec<Fields>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkloadReport {
    pub scan: Vec<ScanResult>,
    pub aggregation: Vec<AggregationResult>,
    pub join: Vec<JoinResult>,
    pub checked: bool,
}

fn run_scan(db: &Database, opts: &WorkloadOptions, report: &mut WorkloadReport) -> Result<(), DbError> {
    if !opts.skip_checks {
        expect_count(db, RANKINGS, TINY_RANKINGS)?;
    }
    for (threshold, expected) in SCAN_SWEEP {
        let count = scan_query(db, threshold)?;
        if !opts.skip_checks {
            check(count == expected, || {
                format!("there should be {expected} URLs with page rank > {threshold}, found {count}")
            })?;
        }
        report.scan.push(ScanResult { threshold, count });
    }
    Ok(())
}

fn total_revenue(db: &Database) -> Result<f64, DbError> {
    let p = Pipeline::builder().group(GroupSpec::all().sum("totalRevenue", "adRevenue")).build()?;
    Ok(db.aggregate(USER_VISITS, &p)?.first().map_or(0.0, revenue))
}

fn run_aggregation(db: &Database, opts: &WorkloadOptions, report: &mut WorkloadReport) -> Result<(), DbError> {
    if !opts.skip_checks {
        expect_count(db, USER_VISITS, TINY_USER_VISITS)?;
    }
    let total = total_revenue(db)?;
    for prefix_len in PREFIX_SWEEP {
        let groups = aggregation_query(db, prefix_len)?;
        if !opts.skip_checks {
            check(groups.len() == GROUP_LIMIT, || {
                format!("prefix {prefix_len}: expected {GROUP_LIMIT} groups, got {}", groups.len())
            })?;
            let sum: f64 = groups.iter().map(revenue).sum();
            check(sum <= total * (1.0 + 1e-9), || {
                format!("prefix {prefix_len}: group revenue {sum} exceeds total {total}")
            })?;
        }
        report.aggregation.push(AggregationResult { prefix_len, groups });
    }
    Ok(())
}

fn run_join(db: &Database, opts: &WorkloadOptions, report: &mut WorkloadReport) -> Result<(), DbError> {
    if !opts.skip_checks {
        expect_count(db, RANKINGS, TINY_RANKINGS)?;
        expect_count(db, USER_VISITS, TINY_USER_VISITS)?;
    }
    prejoin(db)?;
    let mut best = f64::NEG_INFINITY;
    for upper in UPPER_DATE_SWEEP {
        let top = join_query(db, upper)?;
        if !opts.skip_checks {
            check(top.len() == 1, || format!("upper date {upper}: expected one document, got {}", top.len()))?;
            let rev = top.first().map_or(0.0, revenue);
            check(rev >= best, || format!("upper date {upper}: top revenue {rev} dropped below {best}"))?;
            best = rev;
        }
        report.join.push(JoinResult { upper_date: upper.to_string(), top });
    }
    Ok(())
}

type Phase = fn(&Database, &WorkloadOptions, &mut WorkloadReport) -> Result<(), DbError>;

/// Runs the selected queries with the parameter sweeps of the reference
/// scripts, checking the tiny data set's expected results unless told not to.
///
/// # Errors
/// The first failing query or `CheckFailed` assertion.
pub fn run_all(db: &Database, opts: &WorkloadOptions) -> Result<WorkloadReport, DbError> {
    let mut report = WorkloadReport { checked: !opts.skip_checks, ..WorkloadReport::default() };
    let phases: [(bool, &str, Phase); 3] = [
        (opts.queries.scan, "scan", run_scan),
        (opts.queries.aggregation, "aggregation", run_aggregation),
        (opts.queries.join, "join", run_join),
    ];
    for (n, (selected, name, phase)) in phases.into_iter().enumerate() {
        if !selected {
            continue;
        }
        log::info!("query {}: {name}", n + 1);
        let started = Instant::now();
        phase(db, opts, &mut report)?;
        crate::trace_bench!("workload query={} phase={name} duration_ms={}", n + 1, started.elapsed().as_millis());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_selection() {
        assert_eq!(QuerySet::parse("2").unwrap(), QuerySet { scan: false, aggregation: true, join: false });
        assert_eq!(QuerySet::parse("all").unwrap(), QuerySet::ALL);
        assert!(QuerySet::parse("4").is_err());
    }

    #[test]
    fn count_check_reports_both_numbers() {
        let db = Database::new();
        db.insert(RANKINGS, Fields::new().with("pageURL", "a")).unwrap();
        let err = expect_count(&db, RANKINGS, 1200).unwrap_err();
        assert_eq!(err.to_string(), "Check failed: rankings.count() returns 1, should be 1200");
        assert!(matches!(expect_count(&db, "nope", 0), Err(DbError::NoSuchCollection(_))));
    }

    #[test]
    fn tiny_data_set_passes_every_check() {
        let db = crate::test_support::tiny_db(3);
        let report = run_all(&db, &WorkloadOptions::default()).unwrap();
        assert!(report.checked);
        assert_eq!(report.scan.iter().map(|s| s.count).collect::<Vec<_>>(), vec![0, 45, 1200]);
        assert!(report.aggregation.iter().all(|a| a.groups.len() == 5));
        assert!(report.join.iter().all(|j| j.top.len() == 1));
    }

    #[test]
    fn other_sizes_run_with_checks_skipped() {
        let db = crate::test_support::small_db(9);
        let opts = WorkloadOptions { skip_checks: true, ..WorkloadOptions::default() };
        let report = run_all(&db, &opts).unwrap();
        assert_eq!(report.scan[1].count, 4);
        assert!(matches!(run_all(&db, &WorkloadOptions::default()), Err(DbError::CheckFailed(_))));
    }

    #[test]
    fn phases_are_traced() {
        let db = crate::test_support::small_db(4);
        let _g = crate::utils::devlog::enable_thread_sink();
        let opts = WorkloadOptions { queries: QuerySet::parse("1").unwrap(), skip_checks: true };
        let report = run_all(&db, &opts).unwrap();
        assert!(report.aggregation.is_empty() && report.join.is_empty());
        let lines = crate::utils::devlog::drain();
        assert!(lines.iter().any(|l| l.starts_with("workload query=1 phase=scan")));
        assert!(!lines.iter().any(|l| l.contains("phase=join")));
    }

    #[test]
    fn bad_upper_date_is_a_stage_error() {
        let db = Database::new();
        db.create_collection(JOINED);
        let err = join_query(&db, "soon").unwrap_err();
        assert!(matches!(err, DbError::Pipeline { stage: 0, .. }));
    }
}
