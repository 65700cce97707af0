//! Fixed-length hash codes and Hamming distance.
//!
//! A [`HashCode`] is a bit vector packed most-significant-bit first into
//! bytes. Unused trailing bits in the last byte are always zero, so two
//! codes of the same bit length can be compared byte-wise.

use serde::Serialize;

use crate::error::{CardscanError, Result};

/// Number of bytes needed to hold `bit_len` bits.
pub fn bytes_for_bits(bit_len: u32) -> usize {
    (bit_len as usize).div_ceil(8)
}

/// A fixed-length bit-vector fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HashCode {
    bit_len: u32,
    #[serde(serialize_with = "hex::serialize")]
    bytes: Vec<u8>,
}

impl HashCode {
    /// Wrap packed bytes holding exactly `bit_len` bits.
    ///
    /// Fails if the byte count does not match the bit length. Padding bits
    /// past `bit_len` are cleared.
    pub fn from_bytes(mut bytes: Vec<u8>, bit_len: u32) -> Result<Self> {
        if bit_len == 0 {
            return Err(CardscanError::ConfigError(
                "hash bit length must be positive".into(),
            ));
        }
        if bytes.len() != bytes_for_bits(bit_len) {
            return Err(CardscanError::HashLengthMismatch {
                expected: bit_len,
                actual: (bytes.len() * 8) as u32,
            });
        }

        let tail = bit_len % 8;
        if tail != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= 0xFFu8 << (8 - tail);
            }
        }

        Ok(Self { bit_len, bytes })
    }

    /// Pack a sequence of bits, first bit into the high bit of byte 0.
    pub fn from_bits<I>(bits: I) -> Result<Self>
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bytes = Vec::new();
        let mut bit_len = 0u32;

        for bit in bits {
            let pos = bit_len % 8;
            if pos == 0 {
                bytes.push(0u8);
            }
            if bit {
                if let Some(last) = bytes.last_mut() {
                    *last |= 0x80 >> pos;
                }
            }
            bit_len += 1;
        }

        Self::from_bytes(bytes, bit_len)
    }

    /// Parse a hex string holding exactly `bit_len` bits.
    pub fn from_hex(hex_str: &str, bit_len: u32) -> Result<Self> {
        let bytes = hex::decode(hex_str.trim()).map_err(|e| {
            CardscanError::ConfigError(format!("invalid hex hash code: {e}"))
        })?;
        Self::from_bytes(bytes, bit_len)
    }

    pub fn bit_len(&self) -> u32 {
        self.bit_len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Number of differing bits.
    ///
    /// Codes of different lengths are not comparable; that is reported as a
    /// [`CardscanError::HashLengthMismatch`] rather than truncated or padded.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        if self.bit_len != other.bit_len {
            return Err(CardscanError::HashLengthMismatch {
                expected: self.bit_len,
                actual: other.bit_len,
            });
        }

        hamming_distance(&self.bytes, &other.bytes).ok_or(CardscanError::HashLengthMismatch {
            expected: self.bit_len,
            actual: other.bit_len,
        })
    }
}

/// Hamming distance between two packed byte slices.
///
/// Returns `None` when the slices differ in length.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> Option<u32> {
    if a.len() != b.len() {
        return None;
    }

    Some(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum())
}
