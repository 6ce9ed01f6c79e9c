#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 16384 { return; }
    let db = docbench::Database::new();
    let opts = docbench::import::ImportOptions { skip_errors: true, ..Default::default() };
    for set in [docbench::import::DataSet::Rankings, docbench::import::DataSet::UserVisits] {
        let _ = docbench::import::import_from_reader(&db, set, data, &opts);
    }
});
