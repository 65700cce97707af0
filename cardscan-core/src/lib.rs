//! Cardscan Core - Trading card identification engine
//!
//! Identifies which reference card a photograph shows by comparing
//! perceptual fingerprints against a precomputed reference table.
//!
//! # Pipeline
//!
//! - Normalize: cover-resize to 600×825 then center-crop
//! - Fingerprint: perceptual, difference and wavelet hashes (32×32 bits each)
//!   plus an auxiliary color hash
//! - Match: Hamming distance against every reference entry, relative
//!   confidence, adaptive high-confidence filter, top-N
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cardscan_core::{
//!     CardIdentifier, FingerprintExtractor, FingerprintParams, HashFamily, MatchPolicy,
//!     ReferenceEntry, ReferenceIndex, STANDARD_BACKEND_ID,
//! };
//!
//! # fn example() -> cardscan_core::Result<()> {
//! let extractor = FingerprintExtractor::new(FingerprintParams::default())?;
//!
//! // Fingerprint the reference scans once.
//! let scan = std::fs::read("base1-4.png")?;
//! let entries = vec![ReferenceEntry::new("base1-4", extractor.fingerprint_bytes(&scan)?)];
//! let index = ReferenceIndex::from_entries(STANDARD_BACKEND_ID, *extractor.params(), entries)?;
//!
//! // Identify a photograph.
//! let engine = CardIdentifier::new(extractor, Arc::new(index), MatchPolicy::default())?;
//! let photo = std::fs::read("photo.jpg")?;
//! let best = &engine.identify_bytes(&photo, HashFamily::Perceptual, 3)?[0];
//! println!("{} ({:.2}%)", best.card_id, best.confidence * 100.0);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod family;
pub mod fingerprint;
pub mod hash;
pub mod index;
pub mod matcher;
pub mod normalize;

// Re-export main types for convenience
pub use backend::{FingerprintBackend, StandardBackend, STANDARD_BACKEND_ID};
pub use config::{EngineConfig, DEFAULT_TOP_N};
pub use engine::{CardIdentifier, IndexHandle};
pub use error::{CardscanError, ErrorKind, Result, CURRENT_TABLE_VERSION, MAX_IMAGE_BYTES};
pub use family::HashFamily;
pub use fingerprint::{FingerprintBundle, FingerprintExtractor, FingerprintParams};
pub use hash::HashCode;
pub use index::{ReferenceEntry, ReferenceIndex, ReferenceTable, TableFormat};
pub use matcher::{MatchPolicy, MatchResult, Matcher, DEFAULT_HIGH_CONFIDENCE_RATIO};
pub use normalize::{decode_image, ImageNormalizer, RawImage, CARD_HEIGHT, CARD_WIDTH};
