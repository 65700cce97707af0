//! End-to-end matching behavior over synthetic reference indexes.
//!
//! Fingerprints are built directly from bit patterns so every distance in
//! these tests is known exactly.

use std::sync::Arc;

use cardscan_core::{
    CardscanError, ErrorKind, FingerprintBundle, FingerprintParams, HashCode, HashFamily,
    MatchPolicy, Matcher, ReferenceEntry, ReferenceIndex, ReferenceTable, TableFormat,
};

/// 8×8 hashes on a 64×64 target: 64-bit family codes, 14-bit color codes.
fn params() -> FingerprintParams {
    FingerprintParams {
        hash_size: 8,
        color_binbits: 1,
        target_width: 64,
        target_height: 64,
    }
}

/// 64-bit code whose first `ones` bits are set.
fn code(ones: usize) -> HashCode {
    HashCode::from_bits((0..64).map(|i| i < ones)).unwrap()
}

fn color() -> HashCode {
    HashCode::from_bits(std::iter::repeat(false).take(14)).unwrap()
}

/// Bundle with the same distance profile under every family.
fn bundle(ones: usize) -> FingerprintBundle {
    FingerprintBundle::new(code(ones), code(ones), code(ones), color())
}

fn index(entries: &[(&str, usize)]) -> Arc<ReferenceIndex> {
    let entries = entries
        .iter()
        .map(|&(id, ones)| ReferenceEntry::new(id, bundle(ones)))
        .collect();
    Arc::new(ReferenceIndex::from_entries("synthetic", params(), entries).unwrap())
}

fn ids(results: &[cardscan_core::MatchResult]) -> Vec<&str> {
    results.iter().map(|r| r.card_id.as_str()).collect()
}

// ============================================================================
// Ranking
// ============================================================================

#[test]
fn test_clear_winner_filters_far_candidates() {
    // Distances from an all-zero query: 2, 10, 40.
    let matcher = Matcher::new(index(&[("A", 2), ("B", 10), ("C", 40)]));
    let results = matcher
        .match_fingerprint(&bundle(0), HashFamily::Perceptual, 5)
        .unwrap();

    assert_eq!(ids(&results), vec!["A", "B"]);
    assert!((results[0].confidence - 0.95).abs() < 1e-12);
    assert!((results[1].confidence - 0.75).abs() < 1e-12);
    assert_eq!(results[0].distance, 2);
}

#[test]
fn test_equal_distances_fall_back_to_whole_index() {
    let matcher = Matcher::new(index(&[("A", 5), ("B", 5), ("C", 5), ("D", 5)]));
    let results = matcher
        .match_fingerprint(&bundle(0), HashFamily::Difference, 10)
        .unwrap();

    assert_eq!(ids(&results), vec!["A", "B", "C", "D"]);
    assert!(results.iter().all(|r| r.confidence == 0.0));
}

#[test]
fn test_exact_duplicates_all_score_one() {
    let matcher = Matcher::new(index(&[("A", 7), ("B", 7), ("C", 7)]));
    let results = matcher
        .match_fingerprint(&bundle(7), HashFamily::Wavelet, 2)
        .unwrap();

    assert_eq!(ids(&results), vec!["A", "B"]);
    assert!(results.iter().all(|r| r.confidence == 1.0 && r.distance == 0));
}

#[test]
fn test_top_n_larger_than_pool() {
    let matcher = Matcher::new(index(&[("A", 1), ("B", 60)]));
    let results = matcher
        .match_fingerprint(&bundle(0), HashFamily::Perceptual, 50)
        .unwrap();
    assert_eq!(ids(&results), vec!["A"]);
}

#[test]
fn test_single_entry_index() {
    let matcher = Matcher::new(index(&[("only", 30)]));
    let results = matcher
        .match_fingerprint(&bundle(0), HashFamily::Perceptual, 3)
        .unwrap();

    // max distance is the entry's own distance: nothing is below half of it.
    assert_eq!(ids(&results), vec!["only"]);
    assert_eq!(results[0].confidence, 0.0);
}

#[test]
fn test_results_are_sorted_and_bounded() {
    let entries: Vec<(String, usize)> = (0..40).map(|i| (format!("card-{i}"), (i * 7) % 41)).collect();
    let refs: Vec<(&str, usize)> = entries.iter().map(|(id, d)| (id.as_str(), *d)).collect();
    let matcher = Matcher::new(index(&refs));

    let results = matcher
        .match_fingerprint(&bundle(0), HashFamily::Perceptual, 6)
        .unwrap();

    assert_eq!(results.len(), 6);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert!(results
        .iter()
        .all(|r| (0.0..=1.0).contains(&r.confidence)));
}

#[test]
fn test_custom_policy() {
    let matcher = Matcher::with_policy(
        index(&[("A", 2), ("B", 10), ("C", 40)]),
        MatchPolicy::new(1.0).unwrap(),
    );
    let results = matcher
        .match_fingerprint(&bundle(0), HashFamily::Perceptual, 5)
        .unwrap();
    assert_eq!(ids(&results), vec!["A", "B"]);

    let matcher = Matcher::with_policy(
        index(&[("A", 2), ("B", 10), ("C", 40)]),
        MatchPolicy::new(0.01).unwrap(),
    );
    let results = matcher
        .match_fingerprint(&bundle(0), HashFamily::Perceptual, 5)
        .unwrap();
    // Nothing below 0.4: fall back to everything.
    assert_eq!(ids(&results), vec!["A", "B", "C"]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_zero_top_n_is_rejected() {
    let matcher = Matcher::new(index(&[("A", 1)]));
    let err = matcher
        .match_fingerprint(&bundle(0), HashFamily::Perceptual, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[test]
fn test_mismatched_query_length_fails_fast() {
    let matcher = Matcher::new(index(&[("A", 1)]));
    let short = HashCode::from_bits(std::iter::repeat(true).take(16)).unwrap();
    let query = FingerprintBundle::new(short.clone(), short.clone(), short, color());

    let err = matcher
        .match_fingerprint(&query, HashFamily::Perceptual, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        CardscanError::HashLengthMismatch {
            expected: 64,
            actual: 16
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_empty_index_is_configuration_error() {
    let err = ReferenceIndex::from_entries("synthetic", params(), Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_saved_table_matches_identically() {
    let dir = tempfile::tempdir().unwrap();
    let original = index(&[("A", 2), ("B", 10), ("C", 40)]);

    for format in [TableFormat::Cbor, TableFormat::Json] {
        let path = dir.path().join(format!("cards.{format}"));
        original.save(&path, format).unwrap();

        let loaded = Arc::new(ReferenceIndex::load(&path).unwrap());
        assert_eq!(loaded.card_ids(), original.card_ids());

        let expected = Matcher::new(Arc::clone(&original))
            .match_fingerprint(&bundle(3), HashFamily::Wavelet, 3)
            .unwrap();
        let actual = Matcher::new(loaded)
            .match_fingerprint(&bundle(3), HashFamily::Wavelet, 3)
            .unwrap();
        assert_eq!(expected, actual, "{format}");
    }
}

#[test]
fn test_table_with_missing_column_is_rejected() {
    let mut table: ReferenceTable = index(&[("A", 2)]).to_table();
    table.columns.remove(&HashFamily::Difference);

    let err = ReferenceIndex::from_table(table).unwrap_err();
    assert!(matches!(err, CardscanError::ConfigError(_)));
}

#[test]
fn test_missing_table_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ReferenceIndex::load(&dir.path().join("absent.cbor")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
