//! Image decoding and canonicalization.
//!
//! Every image is brought to the same size and pixel format before it is
//! fingerprinted, so photographs taken at any resolution are comparable with
//! the reference scans.
//!
//! # Algorithm
//!
//! 1. Convert to RGB8.
//! 2. Scale preserving aspect ratio so the image *covers* the target: a
//!    relatively wider input is fitted to the target height, anything else
//!    to the target width. Lanczos3 resampling.
//! 3. Center-crop the overflow.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use tracing::debug;

use crate::error::{CardscanError, Result, MAX_IMAGE_BYTES};

/// Default canonical card width in pixels.
pub const CARD_WIDTH: u32 = 600;

/// Default canonical card height in pixels.
pub const CARD_HEIGHT: u32 = 825;

/// Decode an encoded image (JPEG, PNG, GIF or WebP).
pub fn decode_image(data: &[u8]) -> Result<DynamicImage> {
    if data.is_empty() {
        return Err(CardscanError::DecodeError("empty image data".into()));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(CardscanError::DecodeError(format!(
            "image is {} bytes, limit is {MAX_IMAGE_BYTES}",
            data.len()
        )));
    }

    image::load_from_memory(data).map_err(|e| CardscanError::DecodeError(e.to_string()))
}

/// Check if the provided bytes appear to be a supported image format.
pub fn is_supported_format(data: &[u8]) -> bool {
    image::guess_format(data).is_ok()
}

/// An undecoded pixel buffer with 8-bit samples.
///
/// `channels` is 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (RGBA); samples are
/// interleaved row-major.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Validate the buffer and wrap it as a [`DynamicImage`].
    pub fn into_dynamic(self) -> Result<DynamicImage> {
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        if self.pixels.len() != expected {
            return Err(CardscanError::DecodeError(format!(
                "raw buffer holds {} bytes, {}x{}x{} needs {expected}",
                self.pixels.len(),
                self.width,
                self.height,
                self.channels
            )));
        }

        let (w, h) = (self.width, self.height);
        let short = || CardscanError::DecodeError("raw buffer too short".into());
        let image = match self.channels {
            1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, self.pixels).ok_or_else(short)?),
            2 => DynamicImage::ImageLumaA8(
                GrayAlphaImage::from_raw(w, h, self.pixels).ok_or_else(short)?,
            ),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, self.pixels).ok_or_else(short)?),
            4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, self.pixels).ok_or_else(short)?),
            n => {
                return Err(CardscanError::DecodeError(format!(
                    "unsupported channel count {n} (expected 1-4)"
                )))
            }
        };

        Ok(image)
    }
}

/// Resizes and crops images to a fixed canonical size.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    width: u32,
    height: u32,
    filter: FilterType,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(CARD_WIDTH, CARD_HEIGHT)
    }
}

impl ImageNormalizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filter: FilterType::Lanczos3,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Scaled size that covers the target while preserving aspect ratio.
    ///
    /// One side equals the target exactly, the other is at least the target.
    pub fn cover_size(&self, width: u32, height: u32) -> (u32, u32) {
        let img_ratio = width as f64 / height as f64;
        let target_ratio = self.width as f64 / self.height as f64;

        if img_ratio > target_ratio {
            let new_width = (self.height as f64 * img_ratio).floor() as u32;
            (new_width.max(self.width), self.height)
        } else {
            let new_height = (self.width as f64 / img_ratio).floor() as u32;
            (self.width, new_height.max(self.height))
        }
    }

    /// Produce an RGB8 image of exactly the target size.
    pub fn normalize(&self, image: &DynamicImage) -> Result<RgbImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CardscanError::DecodeError(format!(
                "image has zero extent ({width}x{height})"
            )));
        }

        let rgb = image.to_rgb8();
        let (new_width, new_height) = self.cover_size(width, height);

        let scaled = if (new_width, new_height) == (width, height) {
            rgb
        } else {
            image::imageops::resize(&rgb, new_width, new_height, self.filter)
        };

        debug!(
            from_width = width,
            from_height = height,
            scaled_width = new_width,
            scaled_height = new_height,
            "Normalized image"
        );

        if new_width > self.width || new_height > self.height {
            let left = (new_width - self.width) / 2;
            let top = (new_height - self.height) / 2;
            Ok(image::imageops::crop_imm(&scaled, left, top, self.width, self.height).to_image())
        } else {
            Ok(scaled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])))
    }

    #[test]
    fn test_cover_size_wide_input_fits_height() {
        let normalizer = ImageNormalizer::default();
        // 2:1 is wider than 600:825
        assert_eq!(normalizer.cover_size(2000, 1000), (1650, 825));
    }

    #[test]
    fn test_cover_size_tall_input_fits_width() {
        let normalizer = ImageNormalizer::default();
        assert_eq!(normalizer.cover_size(300, 600), (600, 1200));
    }

    #[test]
    fn test_cover_size_exact_ratio() {
        let normalizer = ImageNormalizer::default();
        assert_eq!(normalizer.cover_size(1200, 1650), (600, 825));
        assert_eq!(normalizer.cover_size(600, 825), (600, 825));
    }

    #[test]
    fn test_normalize_output_dimensions() {
        let normalizer = ImageNormalizer::default();
        for (w, h) in [(2000, 1000), (300, 900), (600, 825), (7, 3), (1, 1), (599, 826)] {
            let out = normalizer.normalize(&solid(w, h)).unwrap();
            assert_eq!(out.dimensions(), (CARD_WIDTH, CARD_HEIGHT), "input {w}x{h}");
        }
    }

    #[test]
    fn test_normalize_converts_grayscale_to_rgb() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(60, 80, image::Luma([128])));
        let out = ImageNormalizer::new(60, 80).normalize(&gray).unwrap();
        assert_eq!(out.dimensions(), (60, 80));
        assert_eq!(out.get_pixel(15, 20).0, [128, 128, 128]);
    }

    #[test]
    fn test_normalize_center_crops() {
        // Left third red, middle third green, right third blue; after fitting
        // a 3:1 image into a 1:1 target only the green middle survives.
        let mut img = RgbImage::new(300, 100);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = match x / 100 {
                0 => Rgb([255, 0, 0]),
                1 => Rgb([0, 255, 0]),
                _ => Rgb([0, 0, 255]),
            };
        }
        let out = ImageNormalizer::new(100, 100)
            .normalize(&DynamicImage::ImageRgb8(img))
            .unwrap();
        assert_eq!(out.get_pixel(50, 50).0, [0, 255, 0]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(out.get_pixel(99, 99).0, [0, 255, 0]);
    }

    #[test]
    fn test_decode_empty_is_decode_error() {
        assert!(matches!(
            decode_image(&[]),
            Err(CardscanError::DecodeError(_))
        ));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(CardscanError::DecodeError(_))
        ));
    }

    #[test]
    fn test_is_supported_format() {
        assert!(is_supported_format(&[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A
        ]));
        assert!(is_supported_format(&[0xFF, 0xD8, 0xFF]));
        assert!(!is_supported_format(&[0x00, 0x00, 0x00]));
    }

    #[test]
    fn test_raw_image_channel_counts() {
        for channels in 1..=4u8 {
            let raw = RawImage::new(4, 2, channels, vec![0u8; 8 * channels as usize]);
            let image = raw.into_dynamic().unwrap();
            assert_eq!(image.dimensions(), (4, 2));
        }
    }

    #[test]
    fn test_raw_image_wrong_length() {
        let raw = RawImage::new(4, 4, 3, vec![0u8; 10]);
        assert!(matches!(
            raw.into_dynamic(),
            Err(CardscanError::DecodeError(_))
        ));
    }

    #[test]
    fn test_raw_image_unsupported_channels() {
        let raw = RawImage::new(2, 2, 5, vec![0u8; 20]);
        let err = raw.into_dynamic().unwrap_err();
        assert!(err.to_string().contains("channel count"));
    }

    #[test]
    fn test_zero_extent_rejected() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            ImageNormalizer::default().normalize(&empty),
            Err(CardscanError::DecodeError(_))
        ));
    }
}
