//! CLI command implementations.

pub mod build_index;
pub mod fingerprint;
pub mod identify;
pub mod inspect;
