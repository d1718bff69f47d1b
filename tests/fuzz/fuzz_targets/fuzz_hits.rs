#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Hit-log parser must not panic on any input.
    if let Ok(records) = covmap::hits::parse(data) {
        let index = covmap::hits::HitIndex::from_records(records);
        for probe in index.probe_ids() {
            let _ = index.records_for_probe(probe).count();
        }
    }
});
