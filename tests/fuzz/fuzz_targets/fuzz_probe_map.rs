#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Probe-map parser must not panic, and accepted maps must aggregate.
    if let Ok(map) = covmap::probe_map::parse(data) {
        let hits = covmap::hits::HitIndex::default();
        let options = covmap::aggregate::AggregateOptions::default();
        let _ = covmap::aggregate::aggregate(&map, &hits, &options);
    }
});
