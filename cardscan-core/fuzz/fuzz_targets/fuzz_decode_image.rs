#![no_main]

//! Fuzz target for decode_image() followed by normalization
//!
//! Run with: cargo +nightly fuzz run fuzz_decode_image

use cardscan_core::{decode_image, ImageNormalizer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = decode_image(data) {
        // Small target keeps each iteration cheap
        let _ = ImageNormalizer::new(60, 82).normalize(&image);
    }
});
