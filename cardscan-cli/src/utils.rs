//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cardscan_core::{ReferenceIndex, TableFormat};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::OutputFormat;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

impl From<OutputFormat> for TableFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Cbor => TableFormat::Cbor,
            OutputFormat::Json => TableFormat::Json,
        }
    }
}

/// Read an input image file.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "Read file");
    Ok(bytes)
}

/// Load and validate a reference index.
pub fn load_index(path: &Path) -> Result<ReferenceIndex> {
    ReferenceIndex::load(path)
        .with_context(|| format!("Failed to load reference index: {}", path.display()))
}

/// Whether the path has a supported image extension.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, in sorted path order.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?
            .path();
        if path.is_file() && is_image_path(&path) {
            images.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-image entry");
        }
    }
    images.sort();
    Ok(images)
}

/// Card identifier for a reference scan: its file stem.
pub fn card_id_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// Format an optional build time as a human-readable UTC string.
pub fn format_built_at(built_at: Option<DateTime<Utc>>) -> String {
    match built_at {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "unknown".to_string(),
    }
}
