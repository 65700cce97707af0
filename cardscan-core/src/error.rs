use thiserror::Error;

/// Current version of the persisted reference table format.
pub const CURRENT_TABLE_VERSION: u32 = 1;

/// Maximum encoded image size accepted by [`crate::normalize::decode_image`] (32 MiB).
pub const MAX_IMAGE_BYTES: usize = 32 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum CardscanError {
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Hash length mismatch: expected {expected} bits, got {actual} bits")]
    HashLengthMismatch { expected: u32, actual: u32 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification used by boundary layers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsupported input image.
    Decode,
    /// Caller supplied a bad family name, result count, etc.
    InvalidInput,
    /// Reference data or fingerprint parameters are unusable.
    Configuration,
    /// Filesystem failure outside of reference loading.
    Io,
}

impl CardscanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DecodeError(_) => ErrorKind::Decode,
            Self::InvalidParameter(_) => ErrorKind::InvalidInput,
            Self::ConfigError(_) | Self::HashLengthMismatch { .. } | Self::SerializationError(_) => {
                ErrorKind::Configuration
            }
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// Whether the caller can retry the same request with corrected input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Decode | ErrorKind::InvalidInput)
    }
}

pub type Result<T> = std::result::Result<T, CardscanError>;
