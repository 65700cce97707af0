//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cardscan_core::{EngineConfig, FingerprintExtractor, HashFamily};
use colored::Colorize;
use tracing::debug;

use crate::utils::read_image;

/// Execute the fingerprint command.
pub fn execute(file: PathBuf, json: bool, quiet: bool) -> Result<()> {
    let config = EngineConfig::from_env().context("Invalid environment configuration")?;
    let content = read_image(&file)?;

    let extractor = FingerprintExtractor::new(config.params)?;
    let bundle = extractor
        .fingerprint_bytes(&content)
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;

    debug!(backend = extractor.backend_id(), "Computed fingerprint");

    if json {
        let text = serde_json::to_string_pretty(&bundle).context("Failed to serialize fingerprint")?;
        println!("{text}");
        return Ok(());
    }

    if !quiet {
        println!("{} {}", "Image:".dimmed(), file.display());
        println!("{} {}", "Backend:".dimmed(), extractor.backend_id());
        for family in HashFamily::ALL {
            println!(
                "{} {}",
                format!("{family:>10}:").dimmed(),
                bundle.hash(family).to_hex()
            );
        }
        println!("{} {}", "     color:".dimmed(), bundle.color().to_hex());
    }
    Ok(())
}
