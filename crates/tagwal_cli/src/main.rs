//! tagwal CLI
//!
//! Command-line tools for tagwal log directories.
//!
//! # Commands
//!
//! - `inspect` - Display segments and cached tags
//! - `verify` - Check every segment for corruption and torn tails
//! - `dump` - Print data records from a tag or position

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// tagwal command-line log tools.
#[derive(Parser)]
#[command(name = "tagwal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the log directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display segments and cached tags
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check every segment for corruption and torn tails
    Verify,

    /// Print data records
    Dump {
        /// Start right after the latest occurrence of this tag
        #[arg(short, long, conflicts_with_all = ["segment", "offset"])]
        tag: Option<String>,

        /// Start in this segment
        #[arg(short, long)]
        segment: Option<u64>,

        /// Start at this byte offset within the segment
        #[arg(short, long, requires = "segment")]
        offset: Option<u64>,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Log path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Log path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Dump {
            tag,
            segment,
            offset,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Log path required for dump")?;
            let start = match (tag, segment) {
                (Some(tag), _) => commands::dump::Start::Tag(tag),
                (None, Some(segment)) => commands::dump::Start::Position(
                    tagwal_core::Position::new(segment, offset.unwrap_or(0)),
                ),
                (None, None) => commands::dump::Start::Beginning,
            };
            commands::dump::run(&path, &start, limit, &format)?;
        }
        Commands::Version => {
            println!("tagwal CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("tagwal core v{}", tagwal_core::VERSION);
        }
    }

    Ok(())
}
