//! Card identification engine.
//!
//! [`CardIdentifier`] wires the normalizer, extractor and matcher together
//! over an [`IndexHandle`]. It is `Send + Sync`; share one instance (for
//! example behind an `Arc`) between all request handlers.
//!
//! ```no_run
//! use std::path::Path;
//! use cardscan_core::{CardIdentifier, FingerprintParams, HashFamily};
//!
//! # fn example() -> cardscan_core::Result<()> {
//! let engine = CardIdentifier::open(Path::new("card_hashes.cbor"), FingerprintParams::default())?;
//!
//! let photo = std::fs::read("photo.jpg")?;
//! for candidate in engine.identify_bytes(&photo, HashFamily::Perceptual, 5)? {
//!     println!("{} ({:.0}%)", candidate.card_id, candidate.confidence * 100.0);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::{Arc, RwLock};

use image::DynamicImage;
use tracing::{info, instrument};

use crate::config::EngineConfig;
use crate::error::{CardscanError, Result};
use crate::family::HashFamily;
use crate::fingerprint::{FingerprintBundle, FingerprintExtractor, FingerprintParams};
use crate::index::ReferenceIndex;
use crate::matcher::{MatchPolicy, MatchResult, Matcher};
use crate::normalize::{decode_image, RawImage};

/// Swappable pointer to the current reference index.
///
/// Readers take a snapshot (`Arc` clone) and never hold the lock while
/// matching, so a [`swap`](Self::swap) never blocks behind, or tears,
/// an in-flight match.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<ReferenceIndex>>,
}

impl IndexHandle {
    pub fn new(index: Arc<ReferenceIndex>) -> Self {
        Self {
            current: RwLock::new(index),
        }
    }

    pub fn snapshot(&self) -> Arc<ReferenceIndex> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Install a new index, returning the previous one.
    pub fn swap(&self, index: Arc<ReferenceIndex>) -> Arc<ReferenceIndex> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, index)
    }
}

/// Identifies trading cards from photographs.
#[derive(Debug)]
pub struct CardIdentifier {
    extractor: FingerprintExtractor,
    index: IndexHandle,
    policy: MatchPolicy,
}

impl CardIdentifier {
    /// Create an engine over an already-loaded index.
    ///
    /// Fails if the index was built with a different backend or parameters
    /// than `extractor` uses.
    pub fn new(
        extractor: FingerprintExtractor,
        index: Arc<ReferenceIndex>,
        policy: MatchPolicy,
    ) -> Result<Self> {
        index.ensure_compatible(extractor.backend_id(), extractor.params())?;
        Ok(Self {
            extractor,
            index: IndexHandle::new(index),
            policy,
        })
    }

    /// Load the reference table at `path` and build a standard engine.
    pub fn open(path: &Path, params: FingerprintParams) -> Result<Self> {
        let extractor = FingerprintExtractor::new(params)?;
        let index = Arc::new(ReferenceIndex::load(path)?);
        Self::new(extractor, index, MatchPolicy::default())
    }

    /// Build an engine from configuration. Blocks while the index loads.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let path = config.index_path.as_deref().ok_or_else(|| {
            CardscanError::ConfigError("no reference index path configured".into())
        })?;
        let extractor = FingerprintExtractor::new(config.params)?;
        let index = Arc::new(ReferenceIndex::load(path)?);
        let policy = MatchPolicy::new(config.high_confidence_ratio)?;
        Self::new(extractor, index, policy)
    }

    pub fn extractor(&self) -> &FingerprintExtractor {
        &self.extractor
    }

    /// Snapshot of the index currently used for matching.
    pub fn index(&self) -> Arc<ReferenceIndex> {
        self.index.snapshot()
    }

    /// Atomically install a new index. Matches already running keep using
    /// the index they started with.
    pub fn replace_index(&self, index: Arc<ReferenceIndex>) -> Result<()> {
        index.ensure_compatible(self.extractor.backend_id(), self.extractor.params())?;
        let entries = index.len();
        let previous = self.index.swap(index);
        info!(
            entries,
            previous_entries = previous.len(),
            "Replaced reference index"
        );
        Ok(())
    }

    /// Reload the index from disk. On failure the current index stays active.
    pub fn reload(&self, path: &Path) -> Result<()> {
        let index = ReferenceIndex::load(path)?;
        self.replace_index(Arc::new(index))
    }

    /// Matcher bound to the current index snapshot.
    pub fn matcher(&self) -> Matcher {
        Matcher::with_policy(self.index.snapshot(), self.policy)
    }

    /// Normalize and fingerprint an image.
    pub fn fingerprint(&self, image: &DynamicImage) -> Result<FingerprintBundle> {
        self.extractor.fingerprint_image(image)
    }

    /// Rank reference cards for a precomputed fingerprint.
    pub fn match_fingerprint(
        &self,
        fingerprint: &FingerprintBundle,
        family: HashFamily,
        top_n: usize,
    ) -> Result<Vec<MatchResult>> {
        self.matcher().match_fingerprint(fingerprint, family, top_n)
    }

    /// Identify a decoded image.
    #[instrument(level = "debug", skip_all, fields(%family, top_n))]
    pub fn identify(
        &self,
        image: &DynamicImage,
        family: HashFamily,
        top_n: usize,
    ) -> Result<Vec<MatchResult>> {
        if top_n == 0 {
            return Err(CardscanError::InvalidParameter(
                "result count must be positive".into(),
            ));
        }
        let fingerprint = self.fingerprint(image)?;
        self.match_fingerprint(&fingerprint, family, top_n)
    }

    /// Identify encoded image bytes (JPEG, PNG, GIF or WebP).
    #[instrument(level = "debug", skip_all, fields(bytes = data.len(), %family, top_n))]
    pub fn identify_bytes(
        &self,
        data: &[u8],
        family: HashFamily,
        top_n: usize,
    ) -> Result<Vec<MatchResult>> {
        let image = decode_image(data)?;
        self.identify(&image, family, top_n)
    }

    /// Identify a raw pixel buffer.
    pub fn identify_raw(
        &self,
        raw: RawImage,
        family: HashFamily,
        top_n: usize,
    ) -> Result<Vec<MatchResult>> {
        let image = raw.into_dynamic()?;
        self.identify(&image, family, top_n)
    }
}
