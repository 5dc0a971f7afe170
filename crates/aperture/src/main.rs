//! Aperture CLI - photo-enrichment pipeline over a local corpus.
//!
//! Aperture scans a photo library, renders resolution tiers, and runs a
//! sequence of independently-resumable analysis phases over it, recording
//! every signal in a single SQLite store.
//!
//! # Usage
//!
//! ```bash
//! # Run every phase in order
//! aperture run-all
//!
//! # Run one phase, sharded across two processes
//! aperture pixel-analysis --shard 0/2
//! aperture pixel-analysis --shard 1/2
//!
//! # Inspect the store
//! aperture stats
//!
//! # View configuration
//! aperture config show
//! ```

use clap::Parser;

mod cli;
mod logging;

use cli::phase::Commands;

/// Aperture - photo-enrichment pipeline over a local corpus.
#[derive(Parser, Debug)]
#[command(name = "aperture")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match aperture_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `aperture config path`."
            );
            aperture_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("aperture v{}", aperture_core::VERSION);

    match cli::phase::execute(&config, cli.command).await? {
        None => Ok(()),
        Some(Commands::Config(args)) => cli::config::execute(args).await,
        Some(Commands::Stats) => cli::stats::execute(&config).await,
        Some(Commands::Models(args)) => cli::models::execute(args).await,
        Some(_) => unreachable!("phase/run-all/fix-blobs handled by cli::phase::execute"),
    }
}
