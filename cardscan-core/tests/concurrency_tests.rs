//! Concurrency and thread safety tests for the identification engine

use std::sync::Arc;
use std::thread;

use cardscan_core::{
    CardIdentifier, FingerprintBundle, FingerprintExtractor, FingerprintParams, HashCode,
    HashFamily, MatchPolicy, MatchResult, Matcher, ReferenceEntry, ReferenceIndex,
    STANDARD_BACKEND_ID,
};
use image::{DynamicImage, Rgb, RgbImage};

fn synthetic_params() -> FingerprintParams {
    FingerprintParams {
        hash_size: 8,
        color_binbits: 1,
        target_width: 64,
        target_height: 64,
    }
}

fn code(seed: u64) -> HashCode {
    HashCode::from_bits((0..64).map(|i| (seed >> i) & 1 == 1)).unwrap()
}

fn bundle(seed: u64) -> FingerprintBundle {
    let color = HashCode::from_bits(std::iter::repeat(false).take(14)).unwrap();
    FingerprintBundle::new(code(seed), code(seed.rotate_left(7)), code(!seed), color)
}

fn synthetic_index(size: u64, prefix: &str) -> Arc<ReferenceIndex> {
    let entries = (0..size)
        .map(|i| {
            let seed = i.wrapping_mul(0x9E37_79B9_7F4A_7C15);
            ReferenceEntry::new(format!("{prefix}-{i}"), bundle(seed))
        })
        .collect();
    Arc::new(ReferenceIndex::from_entries("synthetic", synthetic_params(), entries).unwrap())
}

fn card_image(shift: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(96, 132, |x, y| {
        let v = ((x * 3 + y * shift) % 256) as u8;
        Rgb([v, 255 - v, (x * 2) as u8])
    }))
}

fn image_params() -> FingerprintParams {
    FingerprintParams {
        hash_size: 8,
        color_binbits: 3,
        target_width: 48,
        target_height: 66,
    }
}

fn image_engine(prefix: &str) -> CardIdentifier {
    let extractor = FingerprintExtractor::new(image_params()).unwrap();
    let entries = (1..=6)
        .map(|shift| {
            ReferenceEntry::new(
                format!("{prefix}-{shift}"),
                extractor.fingerprint_image(&card_image(shift)).unwrap(),
            )
        })
        .collect();
    let index = ReferenceIndex::from_entries(STANDARD_BACKEND_ID, image_params(), entries).unwrap();
    CardIdentifier::new(extractor, Arc::new(index), MatchPolicy::default()).unwrap()
}

#[test]
fn concurrent_matches_agree_with_sequential() {
    let matcher = Matcher::new(synthetic_index(500, "card"));
    let queries: Vec<u64> = (0..16).map(|i| i * 31 + 5).collect();

    let expected: Vec<Vec<MatchResult>> = queries
        .iter()
        .map(|&q| {
            matcher
                .match_fingerprint(&bundle(q), HashFamily::Perceptual, 5)
                .unwrap()
        })
        .collect();

    let handles: Vec<_> = queries
        .iter()
        .map(|&q| {
            let matcher = matcher.clone();
            thread::spawn(move || {
                matcher
                    .match_fingerprint(&bundle(q), HashFamily::Perceptual, 5)
                    .expect("match should succeed")
            })
        })
        .collect();

    let actual: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for (i, (e, a)) in expected.iter().zip(&actual).enumerate() {
        assert_eq!(e, a, "Thread {i} produced different results");
    }
}

#[test]
fn concurrent_identical_queries_are_deterministic() {
    let engine = Arc::new(image_engine("card"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let family = HashFamily::ALL[i % 3];
            thread::spawn(move || {
                (
                    family,
                    engine
                        .identify(&card_image(4), family, 3)
                        .expect("identify should succeed"),
                )
            })
        })
        .collect();

    for handle in handles {
        let (family, results) = handle.join().unwrap();
        assert_eq!(results[0].card_id, "card-4", "{family}");
        assert_eq!(results[0].distance, 0, "{family}");
    }
}

#[test]
fn index_replacement_during_queries() {
    let engine = Arc::new(image_engine("old"));
    let replacement = {
        let fresh = image_engine("new");
        fresh.index()
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..20 {
                    let results = engine
                        .identify(&card_image(2), HashFamily::Perceptual, 1)
                        .expect("identify should succeed");
                    // Each query sees one whole index, never a mix.
                    let id = &results[0].card_id;
                    assert!(id == "old-2" || id == "new-2", "unexpected {id}");
                }
            })
        })
        .collect();

    engine.replace_index(replacement).unwrap();

    for reader in readers {
        reader.join().unwrap();
    }

    let results = engine
        .identify(&card_image(2), HashFamily::Perceptual, 1)
        .unwrap();
    assert_eq!(results[0].card_id, "new-2");
}

#[test]
fn snapshot_outlives_replacement() {
    let engine = image_engine("old");
    let matcher = engine.matcher();

    engine.replace_index(image_engine("new").index()).unwrap();

    let fingerprint = engine.fingerprint(&card_image(5)).unwrap();
    let stale = matcher
        .match_fingerprint(&fingerprint, HashFamily::Wavelet, 1)
        .unwrap();
    let fresh = engine
        .match_fingerprint(&fingerprint, HashFamily::Wavelet, 1)
        .unwrap();

    assert_eq!(stale[0].card_id, "old-5");
    assert_eq!(fresh[0].card_id, "new-5");
}

#[test]
fn engine_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CardIdentifier>();
    assert_send_sync::<Matcher>();
    assert_send_sync::<ReferenceIndex>();
}
