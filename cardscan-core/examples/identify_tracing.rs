//! Example demonstrating identification tracing instrumentation.
//!
//! Builds a tiny in-memory reference index from generated card images and
//! identifies a recompressed copy of one of them.
//!
//! Run with: cargo run -p cardscan-core --example identify_tracing

use std::io::Cursor;
use std::sync::Arc;

use cardscan_core::{
    CardIdentifier, FingerprintExtractor, FingerprintParams, HashFamily, MatchPolicy,
    ReferenceEntry, ReferenceIndex, STANDARD_BACKEND_ID,
};
use image::{DynamicImage, Rgb, RgbImage};
use tracing_subscriber::{fmt, EnvFilter};

fn card(seed: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(300, 412, |x, y| {
        let band = (x / (10 + seed * 7) + y / (15 + seed * 3)) % 2;
        let v = ((x * seed + y) % 256) as u8;
        if band == 0 {
            Rgb([v, 200, 255 - v])
        } else {
            Rgb([255 - v, 40, v])
        }
    }))
}

fn main() {
    // Initialize tracing subscriber with debug level
    fmt()
        .with_env_filter(EnvFilter::new("cardscan_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Card Identification Tracing Demo ===\n");

    let params = FingerprintParams::default();
    let extractor = match FingerprintExtractor::new(params) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Failed to create extractor: {}", e);
            return;
        }
    };

    let mut entries = Vec::new();
    for seed in 1..=4 {
        match extractor.fingerprint_image(&card(seed)) {
            Ok(fp) => entries.push(ReferenceEntry::new(format!("demo-{seed}"), fp)),
            Err(e) => {
                eprintln!("Failed to fingerprint demo-{}: {}", seed, e);
                return;
            }
        }
    }

    let engine = match ReferenceIndex::from_entries(STANDARD_BACKEND_ID, params, entries)
        .and_then(|index| CardIdentifier::new(extractor, Arc::new(index), MatchPolicy::default()))
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Failed to build engine: {}", e);
            return;
        }
    };

    // Simulate a photo: JPEG re-encode of card 3
    let mut photo = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut photo, 80);
    if let Err(e) = card(3).write_with_encoder(encoder) {
        eprintln!("Failed to encode photo: {}", e);
        return;
    }

    println!("\nIdentifying photo...\n");

    match engine.identify_bytes(&photo.into_inner(), HashFamily::Perceptual, 3) {
        Ok(results) => {
            println!("\nCandidates:");
            for r in results {
                println!(
                    "   {:<8} confidence {:>6.2}%  distance {}",
                    r.card_id,
                    r.confidence * 100.0,
                    r.distance
                );
            }
        }
        Err(e) => {
            println!("\nFailed: {}", e);
        }
    }
}
