//! Build-index command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cardscan_core::{
    EngineConfig, FingerprintExtractor, ReferenceEntry, ReferenceIndex, TableFormat,
};
use chrono::Utc;
use colored::Colorize;
use tracing::{debug, info, warn};

use crate::utils::{card_id_for, list_images, read_image};
use crate::OutputFormat;

/// Execute the build-index command.
pub fn execute(dir: PathBuf, output: PathBuf, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = EngineConfig::from_env().context("Invalid environment configuration")?;
    let extractor = FingerprintExtractor::new(config.params)?;

    let images = list_images(&dir)?;
    if images.is_empty() {
        bail!("No reference images found in {}", dir.display());
    }

    let mut entries = Vec::with_capacity(images.len());
    for path in &images {
        let Some(card_id) = card_id_for(path) else {
            warn!(path = %path.display(), "Skipping file without a usable name");
            continue;
        };
        let content = read_image(path)?;
        let fingerprint = extractor
            .fingerprint_bytes(&content)
            .with_context(|| format!("Failed to fingerprint {}", path.display()))?;
        debug!(%card_id, "Fingerprinted reference card");
        entries.push(ReferenceEntry::new(card_id, fingerprint));
    }

    let index = ReferenceIndex::from_entries(extractor.backend_id(), config.params, entries)?
        .with_built_at(Utc::now());

    let table_format = TableFormat::from(format);
    index
        .save(&output, table_format)
        .with_context(|| format!("Failed to write reference index: {}", output.display()))?;

    info!(
        entries = index.len(),
        path = %output.display(),
        format = %table_format,
        "Built reference index"
    );

    if !quiet {
        println!(
            "{} {} cards -> {} ({})",
            "Indexed".green().bold(),
            index.len(),
            output.display(),
            table_format
        );
    }
    Ok(())
}
