use csv::StringRecord;
use std::io::Read;

use super::options::{ImportOptions, ImportReport};
use crate::collection::Collection;
use crate::document::{Fields, Value};
use crate::errors::DbError;

/// The two Big Data Benchmark tables and their headerless CSV layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSet {
    Rankings,
    UserVisits,
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Text,
    Int,
    Float,
    Date,
}

const RANKINGS: &[(&str, Column)] =
    &[("pageURL", Column::Text), ("pageRank", Column::Int), ("avgDuration", Column::Int)];

const USER_VISITS: &[(&str, Column)] = &[
    ("sourceIP", Column::Text),
    ("destURL", Column::Text),
    ("visitDate", Column::Date),
    ("adRevenue", Column::Float),
    ("userAgent", Column::Text),
    ("countryCode", Column::Text),
    ("languageCode", Column::Text),
    ("searchWord", Column::Text),
    ("duration", Column::Int),
];

impl DataSet {
    #[must_use]
    pub const fn collection_name(self) -> &'static str {
        match self {
            Self::Rankings => "rankings",
            Self::UserVisits => "userVisits",
        }
    }

    fn columns(self) -> &'static [(&'static str, Column)] {
        match self {
            Self::Rankings => RANKINGS,
            Self::UserVisits => USER_VISITS,
        }
    }

    /// Column names in file order.
    #[must_use]
    pub fn field_names(self) -> Vec<&'static str> {
        self.columns().iter().map(|(n, _)| *n).collect()
    }

    /// Converts one CSV row into typed fields.
    ///
    /// # Errors
    /// `Validation` naming the row and column on a wrong column count or an
    /// unparsable value.
    pub fn parse_record(self, row: u64, rec: &StringRecord) -> Result<Fields, DbError> {
        let ctx = || format!("{} row {row}", self.collection_name());
        let cols = self.columns();
        if rec.len() != cols.len() {
            return Err(DbError::validation(ctx(), format!("expected {} columns, found {}", cols.len(), rec.len())));
        }
        let mut fields = Fields::with_capacity(cols.len());
        for ((name, kind), raw) in cols.iter().zip(rec.iter()) {
            let bad = |what: &str| DbError::validation(ctx(), format!("{name}: {raw:?} is not {what}"));
            let v = match kind {
                Column::Text => Value::infer(raw),
                Column::Int => Value::from(raw.trim().parse::<i64>().map_err(|_| bad("an integer"))?),
                Column::Float => Value::from(raw.trim().parse::<f64>().map_err(|_| bad("a number"))?),
                Column::Date => Value::date(raw.trim()).map_err(|_| bad("a YYYY-MM-DD date"))?,
            };
            fields.insert(*name, v);
        }
        Ok(fields)
    }
}

/// Streams headerless CSV rows of `data_set` into `collection` in batches.
///
/// # Errors
/// The first malformed row unless `skip_errors` is set, or `CollectionDropped`.
pub fn import_csv<R: Read>(
    collection: &Collection,
    data_set: DataSet,
    reader: R,
    opts: &ImportOptions,
    report: &mut ImportReport,
) -> Result<(), DbError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(reader);
    let batch_size = opts.batch_size.max(1);
    let mut batch: Vec<Fields> = Vec::with_capacity(batch_size);
    let mut row: u64 = 0;
    for rec in rdr.records() {
        row += 1;
        let parsed = rec.map_err(DbError::from).and_then(|r| data_set.parse_record(row, &r));
        match parsed {
            Ok(fields) => batch.push(fields),
            Err(e) if opts.skip_errors => {
                log::warn!("skipping {} row {row}: {e}", data_set.collection_name());
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
        if batch.len() >= batch_size {
            report.inserted += collection.insert_many(batch.drain(..))?.len() as u64;
        }
        if opts.progress_every > 0 && row % opts.progress_every as u64 == 0 {
            log::info!("imported {} records into {}", report.inserted, collection.name());
        }
    }
    if !batch.is_empty() {
        report.inserted += collection.insert_many(batch)?.len() as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_uservisits_row() {
        let rec = StringRecord::from(vec![
            "158.112.27.3",
            "nbizrgdziebsaecsecujfjcqtvnpcnxxwiopmddorcxnlijdizgoi",
            "1991-06-10",
            "115.6531",
            "Mozilla/5.0",
            "FRA",
            "FRA-FR",
            "sweater",
            "6",
        ]);
        let f = DataSet::UserVisits.parse_record(1, &rec).unwrap();
        assert_eq!(f.get("visitDate"), Some(&Value::date("1991-06-10").unwrap()));
        assert_eq!(f.get("adRevenue"), Some(&Value::from(115.6531)));
        assert_eq!(f.get("duration"), Some(&Value::from(6)));
        assert_eq!(f.names().collect::<Vec<_>>(), DataSet::UserVisits.field_names());
    }

    #[test]
    fn bad_rows_name_their_position() {
        let err = DataSet::Rankings.parse_record(7, &StringRecord::from(vec!["u", "x", "1"])).unwrap_err();
        assert!(err.to_string().contains("rankings row 7"));
        assert!(DataSet::Rankings.parse_record(1, &StringRecord::from(vec!["u", "1"])).is_err());
    }

    #[test]
    fn batches_and_skips() {
        let col = Collection::new("rankings");
        let data = "a,1,2\nb,oops,2\nc,3,4\nd,5,6\n";
        let opts = ImportOptions { batch_size: 2, skip_errors: true, ..ImportOptions::default() };
        let mut report = ImportReport::default();
        import_csv(&col, DataSet::Rankings, data.as_bytes(), &opts, &mut report).unwrap();
        assert_eq!((report.inserted, report.skipped), (3, 1));
        assert_eq!(col.len(), 3);

        let strict = ImportOptions::default();
        let err = import_csv(&Collection::new("r"), DataSet::Rankings, data.as_bytes(), &strict, &mut ImportReport::default());
        assert!(matches!(err, Err(DbError::Validation { .. })));
    }
}
