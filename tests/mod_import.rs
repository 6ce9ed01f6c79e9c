use docbench::Database;
use docbench::document::Value;
use docbench::errors::DbError;
use docbench::import::{self, DataSet, ImportOptions};
use docbench::query::Predicate;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};

const RANKINGS: &str = "aaa.html,120,5\nbbb.html,20,3\nccc.html,55,9\n";
const VISITS: &str = "\
10.1.2.3,aaa.html,1985-03-02,12.5,\"Mozilla/5.0 (X11, Linux)\",DEU,DEU-DE,fahrrad,4
10.1.9.9,ccc.html,1999-12-31,0.25,curl/8.0,USA,USA-EN,bike,1
";

fn deflate_file(dir: &Path, name: &str, text: &str) -> PathBuf {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(text.as_bytes()).unwrap();
    let p = dir.join(name);
    std::fs::write(&p, enc.finish().unwrap()).unwrap();
    p
}

#[test]
fn imports_plain_and_deflated_parts() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("rankings-0.csv");
    std::fs::write(&plain, RANKINGS).unwrap();
    let packed = deflate_file(dir.path(), "000001_0.deflate", "ddd.html,1001,2\n");
    let db = Database::new();
    let report = import::import_rankings(&db, &[plain, packed], &ImportOptions::default()).unwrap();
    assert_eq!(report.inserted, 4);
    assert_eq!(report.collection, "rankings");
    assert_eq!(db.count("rankings", Some(&Predicate::new().gt("pageRank", 100))).unwrap(), 2);
}

#[test]
fn uservisits_are_typed() {
    let dir = tempfile::tempdir().unwrap();
    let p = deflate_file(dir.path(), "000000_0.deflate", VISITS);
    let db = Database::new();
    import::import_uservisits(&db, &[p], &ImportOptions::default()).unwrap();
    let first = db.find_one("userVisits", &Predicate::new().eq("destURL", "aaa.html")).unwrap().unwrap();
    assert_eq!(first.get("visitDate"), Some(&Value::date("1985-03-02").unwrap()));
    assert_eq!(first.get("adRevenue"), Some(&Value::from(12.5)));
    assert_eq!(first.get("userAgent"), Some(&Value::from("Mozilla/5.0 (X11, Linux)")));
    assert_eq!(first.get("duration"), Some(&Value::from(4)));
}

#[test]
fn malformed_rows_abort_unless_skipped() {
    let text = "aaa.html,12,1\nbad-row\nccc.html,x,1\nddd.html,30,2\n";
    let db = Database::new();
    let err = import::import_from_reader(&db, DataSet::Rankings, text.as_bytes(), &ImportOptions::default());
    assert!(matches!(err, Err(DbError::Validation { .. })));

    let db = Database::new();
    let opts = ImportOptions { skip_errors: true, batch_size: 1, ..ImportOptions::default() };
    let report = import::import_from_reader(&db, DataSet::Rankings, text.as_bytes(), &opts).unwrap();
    assert_eq!((report.inserted, report.skipped), (2, 2));
}

#[test]
fn missing_file_is_an_io_error() {
    let db = Database::new();
    let err = import::import_rankings(&db, &["/definitely/not/here.csv"], &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, DbError::Io(_)));
}
