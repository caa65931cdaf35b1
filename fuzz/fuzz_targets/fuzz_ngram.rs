#![no_main]

use libfuzzer_sys::fuzz_target;
use sifter::index::FileFilter;
use sifter::utils::{TokenHasher, lines, query_grams};
use sifter::BloomParams;

fuzz_target!(|data: &[u8]| {
    // Every 3-byte window of every line must hit the file's own filter
    let Ok(params) = BloomParams::new(3, 61) else {
        return;
    };
    let hasher = TokenHasher::new(params);
    let filter = FileFilter::from_content(data, &hasher);

    for line in lines(data) {
        for gram in query_grams(line) {
            if !gram.is_empty() {
                assert!(filter.might_contain(gram, &hasher));
            }
        }
    }
});
