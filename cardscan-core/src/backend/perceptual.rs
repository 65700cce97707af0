//! DCT perceptual hash.
//!
//! The grayscale image is resampled to `4n × 4n` (`n` = hash size), a 2-D
//! DCT-II is taken, and the `n × n` lowest-frequency block is kept. Each bit
//! records whether its coefficient lies strictly above the block's median,
//! so coefficients equal to the median never set a bit.

use std::f64::consts::PI;

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::{CardscanError, Result};
use crate::hash::HashCode;

/// Ratio between the DCT input side and the hash grid side.
const HIGHFREQ_FACTOR: u32 = 4;

/// Coefficients this close to zero are rounding residue from constant rows
/// or columns and are flushed to exactly zero.
const ZERO_TOLERANCE: f64 = 1e-9;

/// Compute the perceptual hash of an image.
pub fn perceptual_hash(image: &RgbImage, hash_size: u32) -> Result<HashCode> {
    if hash_size == 0 {
        return Err(CardscanError::ConfigError(
            "perceptual hash size must be positive".into(),
        ));
    }

    let side = hash_size * HIGHFREQ_FACTOR;
    let gray = imageops::grayscale(image);
    let resized = imageops::resize(&gray, side, side, FilterType::Lanczos3);
    let pixels: Vec<f64> = resized.pixels().map(|p| p.0[0] as f64 / 255.0).collect();

    let mut coeffs = dct_2d_low(&pixels, side as usize, hash_size as usize);
    for c in coeffs.iter_mut().filter(|c| c.abs() <= ZERO_TOLERANCE) {
        *c = 0.0;
    }

    let median = median(&coeffs);
    HashCode::from_bits(coeffs.iter().map(|&c| c > median))
}

/// DCT-II basis rows `0..keep` for a signal of length `size`, scaled by `1/size`.
fn cosine_table(size: usize, keep: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(keep * size);
    for k in 0..keep {
        for i in 0..size {
            let angle = PI * (k * (2 * i + 1)) as f64 / (2 * size) as f64;
            table.push(angle.cos() / size as f64);
        }
    }
    table
}

/// Lowest `keep × keep` coefficients of the 2-D DCT-II of a `size × size`
/// block, row-major with the vertical frequency as the row.
fn dct_2d_low(data: &[f64], size: usize, keep: usize) -> Vec<f64> {
    let table = cosine_table(size, keep);

    // rows[y * keep + u]: horizontal transform of every input row.
    let mut rows = vec![0.0; size * keep];
    for (y, row) in data.chunks_exact(size).enumerate() {
        for (u, basis) in table.chunks_exact(size).enumerate() {
            rows[y * keep + u] = row.iter().zip(basis).map(|(a, b)| a * b).sum();
        }
    }

    let mut out = vec![0.0; keep * keep];
    for (v, basis) in table.chunks_exact(size).enumerate() {
        for u in 0..keep {
            out[v * keep + u] = basis
                .iter()
                .enumerate()
                .map(|(y, b)| rows[y * keep + u] * b)
                .sum();
        }
    }
    out
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
