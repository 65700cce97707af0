//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and batch jobs to handle errors appropriately.

use std::io;

use cardscan_core::{CardscanError, ErrorKind};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (unknown family, zero result count).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (image could not be decoded).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Configuration error (reference index unusable, bad environment).
/// Maps to EX_CONFIG from sysexits.h.
pub const CONFIG_ERROR: i32 = 78;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        Self::error(classify(err), format!("{err:#}"))
    }
}

/// Classify an error by inspecting the chain.
fn classify(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.chain().find_map(|e| e.downcast_ref::<CardscanError>()) {
        return match e.kind() {
            ErrorKind::InvalidInput => USAGE_ERROR,
            ErrorKind::Decode => DATA_ERROR,
            ErrorKind::Configuration => CONFIG_ERROR,
            ErrorKind::Io => IO_ERROR,
        };
    }

    match err.chain().find_map(|e| e.downcast_ref::<io::Error>()) {
        Some(e) if e.kind() == io::ErrorKind::NotFound => INPUT_ERROR,
        Some(_) => IO_ERROR,
        None => GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_core_errors_map_by_kind() {
        let cases = [
            (CardscanError::InvalidParameter("top n".into()), USAGE_ERROR),
            (CardscanError::DecodeError("bad png".into()), DATA_ERROR),
            (CardscanError::ConfigError("empty index".into()), CONFIG_ERROR),
            (
                CardscanError::HashLengthMismatch {
                    expected: 1024,
                    actual: 64,
                },
                CONFIG_ERROR,
            ),
        ];

        for (err, code) in cases {
            let err = anyhow::Error::new(err).context("Identification failed");
            assert_eq!(ExitCode::from_anyhow(&err).code, code, "{err:#}");
        }
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = std::fs::read("/definitely/not/here.png")
            .context("Failed to read file")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_other_errors_are_general() {
        let err = anyhow::anyhow!("something else");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, GENERAL_ERROR);
        assert_eq!(exit.message.as_deref(), Some("something else"));
    }

    #[test]
    fn test_success_has_no_message() {
        let exit = ExitCode::success();
        assert_eq!(exit.code, SUCCESS);
        assert!(exit.message.is_none());
    }
}
