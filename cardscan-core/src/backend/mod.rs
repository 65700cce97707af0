//! Fingerprinting capability.
//!
//! The engine never computes hash bits itself; it asks a
//! [`FingerprintBackend`] for one code per family plus a color code. The
//! backend's [`id`](FingerprintBackend::id) is written into every reference
//! table so that tables produced by a different backend are rejected when
//! loaded instead of producing meaningless distances.
//!
//! ## Standard backend (`standard-v1`)
//!
//! - **perceptual**: DCT low-frequency block, strictly above its median
//! - **difference**: horizontal gradient hash from `image_hasher`
//! - **wavelet**: Haar LL-band hash
//! - **color**: HSV histogram hash
//!
//! Every code is packed most-significant-bit first. `standard-v1` is tied to
//! `image_hasher` 3.1.1 (pinned exactly in the workspace manifest): a
//! different release may resample differently and must ship under a new id.

mod color;
mod perceptual;
mod wavelet;

use image::RgbImage;
use image_hasher::{BitOrder, HashAlg, Hasher, HasherConfig};

use crate::error::Result;
use crate::family::HashFamily;
use crate::fingerprint::FingerprintParams;
use crate::hash::HashCode;

pub use color::{color_hash, COLOR_HASH_VALUES};
pub use perceptual::perceptual_hash;
pub use wavelet::wavelet_hash;

/// Identifier of [`StandardBackend`] as written into reference tables.
///
/// Valid for `image_hasher` 3.1.1 only.
pub const STANDARD_BACKEND_ID: &str = "standard-v1";

/// A source of perceptual hash codes.
///
/// Implementations must be thread-safe (`Send + Sync`): one backend instance
/// serves every concurrent request.
pub trait FingerprintBackend: Send + Sync {
    /// Stable identifier recorded alongside reference data.
    fn id(&self) -> &'static str;

    /// Hash a normalized image under one ranking family.
    fn hash(&self, family: HashFamily, image: &RgbImage) -> Result<HashCode>;

    /// Auxiliary color-histogram hash of a normalized image.
    fn color_hash(&self, image: &RgbImage) -> Result<HashCode>;
}

/// Default backend: `image_hasher` gradient hash plus local DCT, wavelet
/// and color hashes.
pub struct StandardBackend {
    params: FingerprintParams,
    difference: Hasher,
}

impl StandardBackend {
    pub fn new(params: FingerprintParams) -> Self {
        let n = params.hash_size;

        let difference = HasherConfig::new()
            .hash_size(n, n)
            .hash_alg(HashAlg::Gradient)
            .bit_order(BitOrder::MsbFirst)
            .to_hasher();

        Self { params, difference }
    }

    pub fn params(&self) -> &FingerprintParams {
        &self.params
    }
}

impl std::fmt::Debug for StandardBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardBackend")
            .field("id", &STANDARD_BACKEND_ID)
            .field("params", &self.params)
            .finish()
    }
}

impl FingerprintBackend for StandardBackend {
    fn id(&self) -> &'static str {
        STANDARD_BACKEND_ID
    }

    fn hash(&self, family: HashFamily, image: &RgbImage) -> Result<HashCode> {
        match family {
            HashFamily::Perceptual => perceptual_hash(image, self.params.hash_size),
            HashFamily::Difference => {
                let hash = self.difference.hash_image(image);
                HashCode::from_bytes(hash.as_bytes().to_vec(), self.params.family_bits())
            }
            HashFamily::Wavelet => wavelet_hash(image, self.params.hash_size),
        }
    }

    fn color_hash(&self, image: &RgbImage) -> Result<HashCode> {
        color_hash(image, self.params.color_binbits)
    }
}
