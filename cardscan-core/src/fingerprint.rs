//! Fingerprint extraction.
//!
//! [`FingerprintExtractor`] is a thin adapter over a [`FingerprintBackend`]:
//! it pins the parameters every hash is computed with and checks that the
//! backend honored them. Reference tables record the same parameters, and
//! loading a table built with different ones fails (see [`crate::index`]).

use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{FingerprintBackend, StandardBackend, COLOR_HASH_VALUES};
use crate::error::{CardscanError, Result};
use crate::family::HashFamily;
use crate::hash::HashCode;
use crate::normalize::{ImageNormalizer, CARD_HEIGHT, CARD_WIDTH};

/// Default hash grid side (32×32 = 1024-bit codes).
pub const DEFAULT_HASH_SIZE: u32 = 32;

/// Default bits per color histogram bin.
pub const DEFAULT_COLOR_BINBITS: u32 = 3;

/// Every parameter that influences hash values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintParams {
    /// Hash grid side for perceptual, difference and wavelet codes.
    pub hash_size: u32,
    /// Bits per color histogram value.
    pub color_binbits: u32,
    /// Normalized image width.
    pub target_width: u32,
    /// Normalized image height.
    pub target_height: u32,
}

impl Default for FingerprintParams {
    fn default() -> Self {
        Self {
            hash_size: DEFAULT_HASH_SIZE,
            color_binbits: DEFAULT_COLOR_BINBITS,
            target_width: CARD_WIDTH,
            target_height: CARD_HEIGHT,
        }
    }
}

impl FingerprintParams {
    pub fn validate(&self) -> Result<()> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(CardscanError::ConfigError(format!(
                "target size must be non-zero, got {}x{}",
                self.target_width, self.target_height
            )));
        }
        if !self.hash_size.is_power_of_two() || !(2..=64).contains(&self.hash_size) {
            return Err(CardscanError::ConfigError(format!(
                "hash size must be a power of two between 2 and 64, got {}",
                self.hash_size
            )));
        }
        if self.hash_size > self.target_width.min(self.target_height) {
            return Err(CardscanError::ConfigError(format!(
                "hash size {} exceeds target size {}x{}",
                self.hash_size, self.target_width, self.target_height
            )));
        }
        if !(1..=8).contains(&self.color_binbits) {
            return Err(CardscanError::ConfigError(format!(
                "color bin bits must be between 1 and 8, got {}",
                self.color_binbits
            )));
        }
        Ok(())
    }

    /// Bit length of perceptual, difference and wavelet codes.
    pub fn family_bits(&self) -> u32 {
        self.hash_size * self.hash_size
    }

    /// Bit length of the color code.
    pub fn color_bits(&self) -> u32 {
        COLOR_HASH_VALUES * self.color_binbits
    }

    pub fn normalizer(&self) -> ImageNormalizer {
        ImageNormalizer::new(self.target_width, self.target_height)
    }
}

/// One hash per family plus the auxiliary color hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerprintBundle {
    perceptual: HashCode,
    difference: HashCode,
    wavelet: HashCode,
    color: HashCode,
}

impl FingerprintBundle {
    pub fn new(
        perceptual: HashCode,
        difference: HashCode,
        wavelet: HashCode,
        color: HashCode,
    ) -> Self {
        Self {
            perceptual,
            difference,
            wavelet,
            color,
        }
    }

    pub fn hash(&self, family: HashFamily) -> &HashCode {
        match family {
            HashFamily::Perceptual => &self.perceptual,
            HashFamily::Difference => &self.difference,
            HashFamily::Wavelet => &self.wavelet,
        }
    }

    /// Color histogram hash. Not used for ranking.
    pub fn color(&self) -> &HashCode {
        &self.color
    }

    /// Check every code against the bit lengths implied by `params`.
    pub fn check_lengths(&self, params: &FingerprintParams) -> Result<()> {
        for family in HashFamily::ALL {
            check_len(self.hash(family), params.family_bits())?;
        }
        check_len(&self.color, params.color_bits())
    }
}

fn check_len(code: &HashCode, expected: u32) -> Result<()> {
    if code.bit_len() != expected {
        return Err(CardscanError::HashLengthMismatch {
            expected,
            actual: code.bit_len(),
        });
    }
    Ok(())
}

/// Normalizes images and computes their [`FingerprintBundle`].
#[derive(Clone)]
pub struct FingerprintExtractor {
    params: FingerprintParams,
    normalizer: ImageNormalizer,
    backend: Arc<dyn FingerprintBackend>,
}

impl std::fmt::Debug for FingerprintExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintExtractor")
            .field("params", &self.params)
            .field("backend", &self.backend.id())
            .finish()
    }
}

impl FingerprintExtractor {
    /// Extractor using the [`StandardBackend`].
    pub fn new(params: FingerprintParams) -> Result<Self> {
        params.validate()?;
        Self::with_backend(params, Arc::new(StandardBackend::new(params)))
    }

    pub fn with_backend(
        params: FingerprintParams,
        backend: Arc<dyn FingerprintBackend>,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            normalizer: params.normalizer(),
            backend,
        })
    }

    pub fn params(&self) -> &FingerprintParams {
        &self.params
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    pub fn normalizer(&self) -> &ImageNormalizer {
        &self.normalizer
    }

    /// Fingerprint an already-normalized image.
    pub fn extract(&self, normalized: &RgbImage) -> Result<FingerprintBundle> {
        let expected = self.normalizer.dimensions();
        if normalized.dimensions() != expected {
            return Err(CardscanError::InvalidParameter(format!(
                "image is {}x{}, expected normalized {}x{}",
                normalized.width(),
                normalized.height(),
                expected.0,
                expected.1
            )));
        }

        let bundle = FingerprintBundle::new(
            self.backend.hash(HashFamily::Perceptual, normalized)?,
            self.backend.hash(HashFamily::Difference, normalized)?,
            self.backend.hash(HashFamily::Wavelet, normalized)?,
            self.backend.color_hash(normalized)?,
        );

        // A backend that ignores the pinned parameters is a deployment bug.
        bundle.check_lengths(&self.params).map_err(|e| {
            CardscanError::ConfigError(format!(
                "backend '{}' produced hashes that do not match parameters: {e}",
                self.backend.id()
            ))
        })?;

        debug!(
            backend = self.backend.id(),
            bits = self.params.family_bits(),
            "Extracted fingerprint"
        );

        Ok(bundle)
    }

    /// Normalize then fingerprint an arbitrary image.
    pub fn fingerprint_image(&self, image: &DynamicImage) -> Result<FingerprintBundle> {
        let normalized = self.normalizer.normalize(image)?;
        self.extract(&normalized)
    }

    /// Decode, normalize and fingerprint encoded image bytes.
    pub fn fingerprint_bytes(&self, data: &[u8]) -> Result<FingerprintBundle> {
        let image = crate::normalize::decode_image(data)?;
        self.fingerprint_image(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Backend returning fixed-size zero codes, for parameter checks.
    struct FixedBackend {
        family_bits: u32,
        color_bits: u32,
    }

    impl FingerprintBackend for FixedBackend {
        fn id(&self) -> &'static str {
            "fixed"
        }

        fn hash(&self, _family: HashFamily, _image: &RgbImage) -> Result<HashCode> {
            HashCode::from_bits(std::iter::repeat(false).take(self.family_bits as usize))
        }

        fn color_hash(&self, _image: &RgbImage) -> Result<HashCode> {
            HashCode::from_bits(std::iter::repeat(false).take(self.color_bits as usize))
        }
    }

    fn small_params() -> FingerprintParams {
        FingerprintParams {
            hash_size: 8,
            color_binbits: 3,
            target_width: 64,
            target_height: 88,
        }
    }

    #[test]
    fn test_default_params() {
        let params = FingerprintParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.family_bits(), 1024);
        assert_eq!(params.color_bits(), 42);
        assert_eq!(params.normalizer().dimensions(), (600, 825));
    }

    #[test]
    fn test_params_validation() {
        let bad_size = FingerprintParams {
            hash_size: 24,
            ..FingerprintParams::default()
        };
        assert!(matches!(
            bad_size.validate(),
            Err(CardscanError::ConfigError(_))
        ));

        let bad_bins = FingerprintParams {
            color_binbits: 0,
            ..FingerprintParams::default()
        };
        assert!(bad_bins.validate().is_err());

        for (hash_size, ok) in [(1, false), (2, true), (64, true), (128, false)] {
            let params = FingerprintParams {
                hash_size,
                ..FingerprintParams::default()
            };
            assert_eq!(params.validate().is_ok(), ok, "hash size {hash_size}");
        }

        let too_small = FingerprintParams {
            hash_size: 64,
            target_width: 32,
            target_height: 32,
            ..FingerprintParams::default()
        };
        assert!(too_small.validate().is_err());
    }

    #[test]
    fn test_identical_images_have_zero_distance() {
        let extractor = FingerprintExtractor::new(small_params()).unwrap();
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(120, 160, |x, y| {
            Rgb([(x * 2) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
        }));

        let a = extractor.fingerprint_image(&image).unwrap();
        let b = extractor.fingerprint_image(&image.clone()).unwrap();

        for family in HashFamily::ALL {
            assert_eq!(a.hash(family).hamming_distance(b.hash(family)).unwrap(), 0);
        }
        assert_eq!(a.color(), b.color());
    }

    #[test]
    fn test_extract_rejects_unnormalized_image() {
        let extractor = FingerprintExtractor::new(small_params()).unwrap();
        let err = extractor.extract(&RgbImage::new(10, 10)).unwrap_err();
        assert!(matches!(err, CardscanError::InvalidParameter(_)));
    }

    #[test]
    fn test_backend_with_wrong_lengths_is_config_error() {
        let params = small_params();
        let backend = Arc::new(FixedBackend {
            family_bits: 16,
            color_bits: params.color_bits(),
        });
        let extractor = FingerprintExtractor::with_backend(params, backend).unwrap();

        let err = extractor
            .extract(&RgbImage::new(params.target_width, params.target_height))
            .unwrap_err();
        assert!(matches!(err, CardscanError::ConfigError(_)));
    }

    #[test]
    fn test_custom_backend_is_used() {
        let params = small_params();
        let backend = Arc::new(FixedBackend {
            family_bits: params.family_bits(),
            color_bits: params.color_bits(),
        });
        let extractor = FingerprintExtractor::with_backend(params, backend).unwrap();
        assert_eq!(extractor.backend_id(), "fixed");

        let bundle = extractor
            .extract(&RgbImage::new(params.target_width, params.target_height))
            .unwrap();
        assert!(bundle.hash(HashFamily::Wavelet).as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fingerprint_bytes_decode_error() {
        let extractor = FingerprintExtractor::new(small_params()).unwrap();
        assert!(matches!(
            extractor.fingerprint_bytes(b"not an image"),
            Err(CardscanError::DecodeError(_))
        ));
    }
}
