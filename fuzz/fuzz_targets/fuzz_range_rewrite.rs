#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Fuzz range rewriting with arbitrary facet values
    // This should not panic or cause undefined behavior
    let _ = qjoin::facet::range::rewrite(data);
});
