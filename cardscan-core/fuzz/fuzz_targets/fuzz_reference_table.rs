#![no_main]

//! Fuzz target for ReferenceTable::from_bytes() and index validation
//!
//! Arbitrary bytes go through the CBOR/JSON loader and, when they parse,
//! through every structural check of ReferenceIndex::from_table(). Neither
//! step may panic: bad tables must surface as errors.
//!
//! Run with: cargo +nightly fuzz run fuzz_reference_table

use cardscan_core::{ReferenceIndex, ReferenceTable};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(table) = ReferenceTable::from_bytes(data) {
        if let Ok(index) = ReferenceIndex::from_table(table) {
            // Accessors on a validated index must not panic either
            let _ = index.to_table();
            let _ = index.entry(0);
        }
    }
});
