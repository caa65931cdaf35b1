#![no_main]

use libfuzzer_sys::fuzz_target;
use sifter::utils::{pack, packed_len, unpack_all};

fuzz_target!(|bits: Vec<bool>| {
    // Packing must round-trip and always carry the trailing byte
    let packed = pack(&bits);
    assert_eq!(packed.len(), packed_len(bits.len()));
    assert_eq!(unpack_all(&packed, bits.len()), bits);
    let padding = &unpack_all(&packed, packed.len() * 8)[bits.len()..];
    assert!(padding.iter().all(|&b| !b));
});
