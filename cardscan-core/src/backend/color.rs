//! HSV color-histogram hash.
//!
//! Fourteen histogram values are quantized to `binbits` bits each:
//! the fraction of black pixels, the fraction of gray pixels, then six hue
//! bins for faintly saturated colors and six for brightly saturated ones.
//! Hue bins are normalized by the number of colored pixels.

use image::RgbImage;

use crate::error::{CardscanError, Result};
use crate::hash::HashCode;

/// Number of quantized values in a color hash.
pub const COLOR_HASH_VALUES: u32 = 14;

const HUE_BINS: usize = 6;
const BLACK_LUMA: u8 = 32;
const GRAY_SATURATION: u8 = 85;
const BRIGHT_SATURATION: u8 = 170;

/// Compute the color hash of an image.
pub fn color_hash(image: &RgbImage, binbits: u32) -> Result<HashCode> {
    if !(1..=8).contains(&binbits) {
        return Err(CardscanError::ConfigError(format!(
            "color bin bits must be 1-8, got {binbits}"
        )));
    }

    let total = image.width() as u64 * image.height() as u64;
    if total == 0 {
        return Err(CardscanError::DecodeError("image has no pixels".into()));
    }

    let mut black = 0u64;
    let mut gray = 0u64;
    let mut colored = 0u64;
    let mut faint = [0u64; HUE_BINS];
    let mut bright = [0u64; HUE_BINS];

    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        if luma(r, g, b) < BLACK_LUMA {
            black += 1;
            continue;
        }

        let (hue, saturation) = hue_saturation(r, g, b);
        if saturation < GRAY_SATURATION {
            gray += 1;
            continue;
        }

        colored += 1;
        let bin = hue_bin(hue);
        if saturation < BRIGHT_SATURATION {
            faint[bin] += 1;
        } else if saturation > BRIGHT_SATURATION {
            bright[bin] += 1;
        }
    }

    let max_value = 1u64 << binbits;
    let quantize = |count: u64, of: u64| ((count * max_value) / of).min(max_value - 1);
    let colored = colored.max(1);

    let mut values = Vec::with_capacity(COLOR_HASH_VALUES as usize);
    values.push(quantize(black, total));
    values.push(quantize(gray, total));
    values.extend(faint.iter().map(|&c| quantize(c, colored)));
    values.extend(bright.iter().map(|&c| quantize(c, colored)));

    HashCode::from_bits(
        values
            .into_iter()
            .flat_map(|v| (0..binbits).rev().map(move |i| (v >> i) & 1 == 1)),
    )
}

/// ITU-R 601-2 luma, fixed point.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// Hue and saturation scaled to 0-255.
fn hue_saturation(r: u8, g: u8, b: u8) -> (u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == min {
        return (0, 0);
    }

    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let (maxf, delta) = (max as f32, (max - min) as f32);
    let saturation = delta / maxf;

    let rc = (maxf - rf) / delta;
    let gc = (maxf - gf) / delta;
    let bc = (maxf - bf) / delta;
    let h = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    let hue = (h / 6.0).rem_euclid(1.0);

    ((hue * 255.0) as u8, (saturation * 255.0) as u8)
}

/// Six equal-width bins over 0-255, last bin closed.
fn hue_bin(hue: u8) -> usize {
    ((hue as usize * HUE_BINS) / 255).min(HUE_BINS - 1)
}
