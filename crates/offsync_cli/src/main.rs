//! offsync CLI
//!
//! Command-line tools for managing an offsync replica directory.
//!
//! # Commands
//!
//! - `sync` - Check the origin for a newer dataset revision and optionally apply it
//! - `prefetch` - Warm the asset cache from a URL list
//! - `inspect` - Display replica statistics and metadata

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// offsync command-line replica tools.
#[derive(Parser)]
#[command(name = "offsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the replica directory
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
    /// Check the origin for a newer dataset revision
    Sync {
        /// The dataset endpoint URL
        #[arg(short, long)]
        url: String,

        /// Primary key field inside each dataset item
        #[arg(short, long, default_value = "id")]
        key_field: String,

        /// Apply an available update instead of only reporting it
        #[arg(short, long)]
        apply: bool,
    },

    /// Warm the asset cache from a URL list
    Prefetch {
        /// File with one URL per line
        #[arg(short, long)]
        list: PathBuf,

        /// Number of parallel fetches
        #[arg(short, long, default_value_t = offsync_engine::DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },

    /// Display replica statistics and metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sync {
            url,
            key_field,
            apply,
        } => {
            let path = cli.path.ok_or("Replica path required for sync")?;
            commands::sync::run(&path, &url, &key_field, apply).await?;
        }
        Commands::Prefetch { list, concurrency } => {
            let path = cli.path.ok_or("Replica path required for prefetch")?;
            commands::prefetch::run(&path, &list, concurrency).await?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Replica path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Version => {
            println!("offsync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "replica schema v{}",
                offsync_store::SCHEMA_VERSION
            );
        }
    }

    Ok(())
}
