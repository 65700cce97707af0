//! Nearest-neighbor matching with adaptive confidence filtering.
//!
//! # Algorithm
//!
//! 1. Hamming distance from the query to every reference entry for one
//!    family, written into a request-local buffer parallel to index order.
//! 2. `confidence = 1 - distance / max_distance`, or 1 for every entry when
//!    `max_distance` is 0.
//! 3. Keep entries with `distance < ratio * max_distance` (ratio defaults
//!    to 0.5). If none qualify, keep every entry.
//! 4. Order by `(distance, index)` and take the first `top_n`.
//!
//! Confidence is relative to the current reference set, not a calibrated
//! probability: the same query can score differently once cards are added.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{CardscanError, Result};
use crate::family::HashFamily;
use crate::fingerprint::FingerprintBundle;
use crate::hash::HashCode;
use crate::index::ReferenceIndex;

/// Default fraction of the maximum distance below which a candidate is
/// considered high-confidence.
pub const DEFAULT_HIGH_CONFIDENCE_RATIO: f64 = 0.5;

/// A ranked candidate card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub card_id: String,
    /// Relative closeness in `[0, 1]` within this query's candidate pool.
    pub confidence: f64,
    /// Raw Hamming distance for the requested family.
    pub distance: u32,
}

/// Candidate position in the reference index with its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCandidate {
    pub index: usize,
    pub distance: u32,
    pub confidence: f64,
}

/// Filtering policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// Candidates with `distance < ratio * max_distance` are preferred.
    pub high_confidence_ratio: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            high_confidence_ratio: DEFAULT_HIGH_CONFIDENCE_RATIO,
        }
    }
}

impl MatchPolicy {
    pub fn new(high_confidence_ratio: f64) -> Result<Self> {
        if !(high_confidence_ratio > 0.0 && high_confidence_ratio <= 1.0) {
            return Err(CardscanError::ConfigError(format!(
                "high confidence ratio must be in (0, 1], got {high_confidence_ratio}"
            )));
        }
        Ok(Self {
            high_confidence_ratio,
        })
    }
}

/// Hamming distance from `query` to every row of `family`'s column.
pub fn distances(index: &ReferenceIndex, family: HashFamily, query: &HashCode) -> Result<Vec<u32>> {
    let column = index.column(family);
    if query.bit_len() != column.bit_len() {
        return Err(CardscanError::HashLengthMismatch {
            expected: column.bit_len(),
            actual: query.bit_len(),
        });
    }

    let q = query.as_bytes();
    Ok(column
        .iter()
        .map(|row| row.iter().zip(q).map(|(a, b)| (a ^ b).count_ones()).sum())
        .collect())
}

/// Rank candidates from a distance vector.
///
/// Pure function over request-local data; `distances[i]` belongs to index
/// row `i`. Returns at most `top_n` candidates.
pub fn rank(distances: &[u32], top_n: usize, policy: &MatchPolicy) -> Vec<RankedCandidate> {
    let Some(&max_distance) = distances.iter().max() else {
        return Vec::new();
    };

    let confidence = |d: u32| {
        if max_distance == 0 {
            1.0
        } else {
            1.0 - d as f64 / max_distance as f64
        }
    };

    let threshold = policy.high_confidence_ratio * max_distance as f64;
    let mut candidates: Vec<usize> = (0..distances.len())
        .filter(|&i| (distances[i] as f64) < threshold)
        .collect();
    let filtered = !candidates.is_empty();
    if !filtered {
        candidates = (0..distances.len()).collect();
    }

    // (distance, index) is unique per candidate, so unstable ordering is
    // still deterministic and keeps ties in index order.
    let key = |&i: &usize| (distances[i], i);
    if top_n < candidates.len() {
        candidates.select_nth_unstable_by_key(top_n, key);
        candidates.truncate(top_n);
    }
    candidates.sort_unstable_by_key(key);

    debug!(
        max_distance,
        high_confidence = filtered,
        pool = distances.len(),
        returned = candidates.len(),
        "Ranked candidates"
    );

    candidates
        .into_iter()
        .map(|i| RankedCandidate {
            index: i,
            distance: distances[i],
            confidence: confidence(distances[i]),
        })
        .collect()
}

/// Matches fingerprints against a shared, immutable [`ReferenceIndex`].
#[derive(Debug, Clone)]
pub struct Matcher {
    index: Arc<ReferenceIndex>,
    policy: MatchPolicy,
}

impl Matcher {
    pub fn new(index: Arc<ReferenceIndex>) -> Self {
        Self::with_policy(index, MatchPolicy::default())
    }

    pub fn with_policy(index: Arc<ReferenceIndex>, policy: MatchPolicy) -> Self {
        Self { index, policy }
    }

    pub fn index(&self) -> &Arc<ReferenceIndex> {
        &self.index
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Rank reference cards by closeness to `fingerprint` under `family`.
    ///
    /// Returns between 1 and `top_n` results, best first.
    pub fn match_fingerprint(
        &self,
        fingerprint: &FingerprintBundle,
        family: HashFamily,
        top_n: usize,
    ) -> Result<Vec<MatchResult>> {
        if top_n == 0 {
            return Err(CardscanError::InvalidParameter(
                "result count must be positive".into(),
            ));
        }

        let distances = distances(&self.index, family, fingerprint.hash(family))?;
        let ranked = rank(&distances, top_n, &self.policy);

        let results: Vec<MatchResult> = ranked
            .into_iter()
            .filter_map(|c| {
                self.index.card_id(c.index).map(|id| MatchResult {
                    card_id: id.to_string(),
                    confidence: c.confidence,
                    distance: c.distance,
                })
            })
            .collect();

        if let Some(best) = results.first() {
            debug!(
                %family,
                card_id = %best.card_id,
                distance = best.distance,
                "Best match confidence: {:.2}%",
                best.confidence * 100.0
            );
        }

        Ok(results)
    }
}
