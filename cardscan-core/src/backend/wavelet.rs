//! Haar wavelet hash.
//!
//! The grayscale image is resampled to the largest power-of-two square that
//! fits inside it, the DC component (the coarsest Haar LL coefficient) is
//! removed, and the LL band is taken at `hash_size × hash_size`. Each bit
//! records whether its coefficient lies above the band's median.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::{CardscanError, Result};
use crate::hash::HashCode;

/// Compute the wavelet hash of an image.
pub fn wavelet_hash(image: &RgbImage, hash_size: u32) -> Result<HashCode> {
    if !hash_size.is_power_of_two() {
        return Err(CardscanError::ConfigError(format!(
            "wavelet hash size must be a power of two, got {hash_size}"
        )));
    }

    let scale = largest_power_of_two(image.width().min(image.height()));
    if scale < hash_size {
        return Err(CardscanError::ConfigError(format!(
            "image {}x{} too small for a {hash_size}x{hash_size} wavelet hash",
            image.width(),
            image.height()
        )));
    }

    let gray = imageops::grayscale(image);
    let resized = imageops::resize(&gray, scale, scale, FilterType::Lanczos3);

    let mut coeffs: Vec<f32> = resized.pixels().map(|p| p.0[0] as f32 / 255.0).collect();

    // Zeroing the max-level LL coefficient subtracts the mean everywhere.
    let mean = coeffs.iter().sum::<f32>() / coeffs.len() as f32;
    coeffs.iter_mut().for_each(|c| *c -= mean);

    let mut size = scale as usize;
    while size > hash_size as usize {
        coeffs = haar_ll(&coeffs, size);
        size /= 2;
    }

    let median = median(&coeffs);
    HashCode::from_bits(coeffs.iter().map(|&c| c > median))
}

/// One level of the orthonormal 2-D Haar transform, low-low band only.
fn haar_ll(data: &[f32], size: usize) -> Vec<f32> {
    let half = size / 2;
    let mut out = Vec::with_capacity(half * half);

    for y in 0..half {
        let top = 2 * y * size;
        let bottom = top + size;
        for x in 0..half {
            let sum = data[top + 2 * x]
                + data[top + 2 * x + 1]
                + data[bottom + 2 * x]
                + data[bottom + 2 * x + 1];
            out.push(sum / 2.0);
        }
    }

    out
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn largest_power_of_two(n: u32) -> u32 {
    if n == 0 {
        0
    } else {
        1 << (31 - n.leading_zeros())
    }
}
