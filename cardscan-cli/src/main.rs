//! Cardscan CLI - Trading card identification tool.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Invalid argument (unknown hash family, zero result count)
  65  Image could not be decoded
  66  Input file not found
  74  I/O error writing output
  78  Reference index or configuration unusable";

#[derive(Parser)]
#[command(name = "cardscan")]
#[command(author, version, about = "Identify trading cards from photographs", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Serialization format for reference tables.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Cbor,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the card shown in an image
    Identify {
        /// Path to the photograph
        #[arg(value_name = "IMAGE")]
        file: PathBuf,

        /// Reference index file [env: CARDSCAN_INDEX_PATH]
        #[arg(short, long, value_name = "PATH")]
        index: Option<PathBuf>,

        /// Hash family: perceptual, difference or wavelet [env: CARDSCAN_DEFAULT_FAMILY]
        #[arg(short, long)]
        family: Option<String>,

        /// Number of candidates to return [env: CARDSCAN_TOP_N]
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the fingerprint hashes of an image
    Fingerprint {
        /// Path to the image
        #[arg(value_name = "IMAGE")]
        file: PathBuf,

        /// Print the fingerprint as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a reference index from a directory of card scans
    BuildIndex {
        /// Directory of reference images; the card id is the file stem
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Output path for the reference table
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Output format for the reference table
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Cbor)]
        format: OutputFormat,
    },

    /// Validate a reference index and print its summary
    Inspect {
        /// Reference index file
        #[arg(value_name = "PATH")]
        index: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "cardscan_core=debug,cardscan=debug,info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let quiet = cli.quiet;

    match cli.command {
        Commands::Identify {
            file,
            index,
            family,
            top_n,
            json,
        } => commands::identify::execute(
            file,
            commands::identify::Overrides {
                index,
                family,
                top_n,
            },
            json,
            quiet,
        ),
        Commands::Fingerprint { file, json } => commands::fingerprint::execute(file, json, quiet),
        Commands::BuildIndex {
            dir,
            output,
            format,
        } => commands::build_index::execute(dir, output, format, quiet),
        Commands::Inspect { index } => commands::inspect::execute(index, quiet),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli) {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    process::exit(exit.code);
}
