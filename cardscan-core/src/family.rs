//! Distance-comparable hash algorithm families.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CardscanError;

/// Hash algorithm family used for ranking.
///
/// The color hash is deliberately not a family: it is carried in every
/// [`crate::FingerprintBundle`] but never used to rank candidates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HashFamily {
    /// DCT-based perceptual hash (phash).
    #[default]
    Perceptual,
    /// Horizontal gradient hash (dhash).
    Difference,
    /// Haar wavelet hash (whash).
    Wavelet,
}

impl HashFamily {
    /// Every family, in column order.
    pub const ALL: [HashFamily; 3] = [Self::Perceptual, Self::Difference, Self::Wavelet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perceptual => "perceptual",
            Self::Difference => "difference",
            Self::Wavelet => "wavelet",
        }
    }

    /// Position of this family's column in [`Self::ALL`].
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Perceptual => 0,
            Self::Difference => 1,
            Self::Wavelet => 2,
        }
    }
}

impl fmt::Display for HashFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for HashFamily {
    type Err = CardscanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "perceptual" | "phash" => Ok(Self::Perceptual),
            "difference" | "dhash" => Ok(Self::Difference),
            "wavelet" | "whash" => Ok(Self::Wavelet),
            other => Err(CardscanError::InvalidParameter(format!(
                "unknown hash family '{other}' (expected perceptual, difference or wavelet)"
            ))),
        }
    }
}
