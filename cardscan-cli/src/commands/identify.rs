//! Identify command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cardscan_core::{CardIdentifier, EngineConfig, HashFamily, MatchResult};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::utils::read_image;

/// Command-line values that take precedence over the environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub index: Option<PathBuf>,
    pub family: Option<String>,
    pub top_n: Option<usize>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonOutput<'a> {
    Single(&'a MatchResult),
    List(&'a [MatchResult]),
}

/// Execute the identify command.
pub fn execute(file: PathBuf, overrides: Overrides, json: bool, quiet: bool) -> Result<()> {
    let mut config = EngineConfig::from_env().context("Invalid environment configuration")?;
    if let Some(index) = overrides.index {
        config.index_path = Some(index);
    }

    // Configuration problems are reported before anything about the query.
    let engine = CardIdentifier::from_config(&config).with_context(|| {
        format!("Cannot start engine (set --index or {})", cardscan_core::config::ENV_INDEX_PATH)
    })?;

    let family = match overrides.family {
        Some(name) => name.parse::<HashFamily>()?,
        None => config.default_family,
    };
    let top_n = overrides.top_n.unwrap_or(config.default_top_n);

    let content = read_image(&file)?;

    let results = engine
        .identify_bytes(&content, family, top_n)
        .with_context(|| format!("Failed to identify {}", file.display()))?;

    if let Some(best) = results.first() {
        info!(
            card_id = %best.card_id,
            confidence = best.confidence,
            candidates = results.len(),
            "Identified card"
        );
    }

    if json {
        // A single requested result is printed as an object, not a list.
        let output = match results.as_slice() {
            [only] if top_n == 1 => JsonOutput::Single(only),
            all => JsonOutput::List(all),
        };
        let text = serde_json::to_string_pretty(&output).context("Failed to serialize results")?;
        println!("{text}");
        return Ok(());
    }

    if !quiet {
        print_results(&file, family, &results);
    }
    Ok(())
}

fn print_results(file: &std::path::Path, family: HashFamily, results: &[MatchResult]) {
    let Some((best, rest)) = results.split_first() else {
        return;
    };

    println!();
    println!("{} {}", "Image:".dimmed(), file.display());
    println!("{} {}", "Family:".dimmed(), family);
    println!();
    println!(
        "   {} {} {}",
        "Best match:".green().bold(),
        best.card_id.bold(),
        format!("({:.2}%, distance {})", best.confidence * 100.0, best.distance).dimmed()
    );

    if !rest.is_empty() {
        println!();
        println!("   {}", "Alternatives:".dimmed());
        for (rank, candidate) in rest.iter().enumerate() {
            println!(
                "   {:>2}. {:<24} {:>6.2}%  {}",
                rank + 2,
                candidate.card_id,
                candidate.confidence * 100.0,
                format!("distance {}", candidate.distance).dimmed()
            );
        }
    }
    println!();
}
