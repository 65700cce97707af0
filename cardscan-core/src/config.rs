//! Engine configuration
//!
//! Loaded from environment variables with defaults matching the stock
//! reference tables. Unset or blank variables take the default; a value
//! that does not parse is a configuration error.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CardscanError, Result};
use crate::family::HashFamily;
use crate::fingerprint::FingerprintParams;
use crate::matcher::DEFAULT_HIGH_CONFIDENCE_RATIO;

/// Default number of candidates returned per query.
pub const DEFAULT_TOP_N: usize = 5;

pub const ENV_INDEX_PATH: &str = "CARDSCAN_INDEX_PATH";
pub const ENV_DEFAULT_FAMILY: &str = "CARDSCAN_DEFAULT_FAMILY";
pub const ENV_TOP_N: &str = "CARDSCAN_TOP_N";
pub const ENV_HIGH_CONFIDENCE_RATIO: &str = "CARDSCAN_HIGH_CONFIDENCE_RATIO";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Reference table location (no default)
    pub index_path: Option<PathBuf>,
    /// Family used when a request does not name one (default: perceptual)
    pub default_family: HashFamily,
    /// Candidates returned when a request does not say (default: 5)
    pub default_top_n: usize,
    /// Fraction of the maximum distance for high-confidence filtering (default: 0.5)
    pub high_confidence_ratio: f64,
    /// Hash parameters; must equal those the reference table was built with
    pub params: FingerprintParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            default_family: HashFamily::default(),
            default_top_n: DEFAULT_TOP_N,
            high_confidence_ratio: DEFAULT_HIGH_CONFIDENCE_RATIO,
            params: FingerprintParams::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let index_path = lookup(ENV_INDEX_PATH)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let default_family =
            parse_var(&lookup, ENV_DEFAULT_FAMILY)?.unwrap_or(defaults.default_family);

        let default_top_n = parse_var::<usize, _>(&lookup, ENV_TOP_N)?
            .unwrap_or(defaults.default_top_n);
        if default_top_n == 0 {
            return Err(CardscanError::ConfigError(format!(
                "{ENV_TOP_N} must be at least 1"
            )));
        }

        let high_confidence_ratio = parse_var::<f64, _>(&lookup, ENV_HIGH_CONFIDENCE_RATIO)?
            .unwrap_or(defaults.high_confidence_ratio);
        if !(high_confidence_ratio > 0.0 && high_confidence_ratio <= 1.0) {
            return Err(CardscanError::ConfigError(format!(
                "{ENV_HIGH_CONFIDENCE_RATIO} must be in (0, 1], got {high_confidence_ratio}"
            )));
        }

        Ok(Self {
            index_path,
            default_family,
            default_top_n,
            high_confidence_ratio,
            params: defaults.params,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
            CardscanError::ConfigError(format!("invalid {key} value '{raw}': {e}"))
        }),
    }
}
