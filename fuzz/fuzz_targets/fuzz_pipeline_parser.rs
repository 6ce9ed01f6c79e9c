#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    // parsed pipelines must also run without panicking
    if let Ok(p) = docbench::pipeline::parse_pipeline_json(s) {
        let input = vec![docbench::document::Fields::new().with("a", 1).with("b", "x")];
        let _ = docbench::pipeline::run_on("fuzz", input, &p, &docbench::pipeline::ExecOptions::default());
    }
});
