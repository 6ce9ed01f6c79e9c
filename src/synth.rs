//! Deterministic Big Data Benchmark shaped fixtures.

use chrono::{NaiveDate, TimeDelta};
use fake::Fake;
use fake::faker::address::en::CountryCode;
use fake::faker::internet::en::UserAgent;
use fake::faker::lorem::en::Word;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::Database;
use crate::document::{DATE_FORMAT, Fields, Value};
use crate::errors::DbError;
use crate::import::DataSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ranking {
    #[serde(rename = "pageURL")]
    pub page_url: String,
    pub page_rank: i64,
    pub avg_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVisit {
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    #[serde(rename = "destURL")]
    pub dest_url: String,
    pub visit_date: String,
    pub ad_revenue: f64,
    pub user_agent: String,
    pub country_code: String,
    pub language_code: String,
    pub search_word: String,
    pub duration: i64,
}

impl Ranking {
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("pageURL", self.page_url.as_str())
            .with("pageRank", self.page_rank)
            .with("avgDuration", self.avg_duration)
    }
}

impl UserVisit {
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("sourceIP", self.source_ip.as_str())
            .with("destURL", self.dest_url.as_str())
            .with("visitDate", Value::Date(self.visit_date.clone()))
            .with("adRevenue", self.ad_revenue)
            .with("userAgent", self.user_agent.as_str())
            .with("countryCode", self.country_code.as_str())
            .with("languageCode", self.language_code.as_str())
            .with("searchWord", self.search_word.as_str())
            .with("duration", self.duration)
    }
}

/// Shape of a generated data set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthSpec {
    pub rankings: usize,
    /// Rankings whose pageRank exceeds 100; the rest fall in 11..=100.
    pub high_rank: usize,
    pub visits: usize,
}

impl SynthSpec {
    /// The "tiny" benchmark data set.
    #[must_use]
    pub const fn tiny() -> Self {
        Self { rankings: 1200, high_rank: 45, visits: 10_000 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SynthData {
    pub rankings: Vec<Ranking>,
    pub visits: Vec<UserVisit>,
}

fn random_date(rng: &mut StdRng, first: NaiveDate, span_days: i64) -> String {
    let d = first + TimeDelta::days(rng.random_range(0..span_days));
    d.format(DATE_FORMAT).to_string()
}

/// Generates rankings and visits from `seed`. Equal seeds give equal data.
///
/// # Errors
/// `Validation` if `high_rank` exceeds `rankings`, or visits are requested
/// without any ranking to point at.
pub fn generate(seed: u64, spec: &SynthSpec) -> Result<SynthData, DbError> {
    if spec.high_rank > spec.rankings {
        return Err(DbError::validation("synth", "high_rank exceeds rankings"));
    }
    if spec.visits > 0 && spec.rankings == 0 {
        return Err(DbError::validation("synth", "visits need at least one ranking"));
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let high: HashSet<usize> = sample(&mut rng, spec.rankings, spec.high_rank).into_iter().collect();
    let rankings: Vec<Ranking> = (0..spec.rankings)
        .map(|i| {
            let word: String = Word().fake_with_rng(&mut rng);
            let page_rank = if high.contains(&i) { rng.random_range(101..=1000) } else { rng.random_range(11..=100) };
            Ranking {
                page_url: format!("{}{i:05}", word.to_lowercase()),
                page_rank,
                avg_duration: rng.random_range(1..=100),
            }
        })
        .collect();

    let first = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let last = NaiveDate::from_ymd_opt(2009, 12, 31).unwrap_or_default();
    let span = (last - first).num_days() + 1;
    let visits = (0..spec.visits)
        .map(|_| {
            let dest = &rankings[rng.random_range(0..rankings.len())];
            let country: String = CountryCode().fake_with_rng(&mut rng);
            UserVisit {
                source_ip: format!(
                    "{}.{}.{}.{}",
                    rng.random_range(1..=255u8),
                    rng.random_range(0..=255u8),
                    rng.random_range(0..=255u8),
                    rng.random_range(1..=254u8)
                ),
                dest_url: dest.page_url.clone(),
                visit_date: random_date(&mut rng, first, span),
                ad_revenue: (rng.random_range(0.0..1000.0f64) * 10_000.0).round() / 10_000.0,
                user_agent: UserAgent().fake_with_rng(&mut rng),
                language_code: format!("{}-{country}", country.to_lowercase()),
                country_code: country,
                search_word: Word().fake_with_rng(&mut rng),
                duration: rng.random_range(1..=10),
            }
        })
        .collect();
    Ok(SynthData { rankings, visits })
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), DbError> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes headerless `rankings.csv` and `uservisits.csv` into `dir`.
///
/// # Errors
/// `Io` or `Csv` on write failures.
pub fn write_csv(dir: &Path, data: &SynthData) -> Result<(PathBuf, PathBuf), DbError> {
    std::fs::create_dir_all(dir)?;
    let rankings = dir.join("rankings.csv");
    let visits = dir.join("uservisits.csv");
    write_rows(&rankings, &data.rankings)?;
    write_rows(&visits, &data.visits)?;
    log::info!(
        "wrote {} rankings and {} visits to {}",
        data.rankings.len(),
        data.visits.len(),
        dir.display()
    );
    Ok((rankings, visits))
}

/// Inserts the data set straight into `db`.
///
/// # Errors
/// `CollectionDropped` if a target handle is dropped concurrently.
pub fn load_into(db: &Database, data: &SynthData) -> Result<(), DbError> {
    db.insert_many(DataSet::Rankings.collection_name(), data.rankings.iter().map(Ranking::to_fields))?;
    db.insert_many(DataSet::UserVisits.collection_name(), data.visits.iter().map(UserVisit::to_fields))?;
    Ok(())
}
