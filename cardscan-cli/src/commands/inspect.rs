//! Inspect command implementation.

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use crate::utils::{format_built_at, load_index};

/// Execute the inspect command.
pub fn execute(path: PathBuf, quiet: bool) -> Result<()> {
    let index = load_index(&path)?;

    if quiet {
        return Ok(());
    }

    let params = index.params();
    println!();
    println!("{} {}", "Reference index:".green().bold(), path.display());
    println!("   {} {}", "Backend:".dimmed(), index.backend());
    println!("   {} {}", "Entries:".dimmed(), index.len());
    println!(
        "   {} {}x{} ({} bits)",
        "Hash size:".dimmed(),
        params.hash_size,
        params.hash_size,
        params.family_bits()
    );
    println!(
        "   {} {} bits per bin ({} bits)",
        "Color hash:".dimmed(),
        params.color_binbits,
        params.color_bits()
    );
    println!(
        "   {} {}x{}",
        "Target:".dimmed(),
        params.target_width,
        params.target_height
    );
    println!("   {} {}", "Built at:".dimmed(), format_built_at(index.built_at()));
    println!();
    Ok(())
}
