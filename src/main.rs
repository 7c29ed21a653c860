mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use matrix::{config, server};

#[derive(Parser)]
#[command(name = "matrix", version, about = "Personal media scrapbook with a multi-agent chat")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Write a JSON backup to stdout
    Export {
        /// Omit every `src` payload
        #[arg(long)]
        preview: bool,
    },
    /// Replace the scrapbook with a JSON backup
    Import {
        file: PathBuf,
    },
    /// Show scrapbook counts
    Stats,
    /// Delete every moment, story, and overlay (agents are kept)
    Reset,
    /// Run database diagnostics
    Doctor,
    /// Print the justified layout of the heap
    Layout {
        /// Container width in pixels
        #[arg(long, default_value_t = 1200.0)]
        width: f64,
        /// JSON file of `[{id, aspect}]`; defaults to the heap with square items
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::MatrixConfig::load()?;

    // Log to stderr so `export` output stays clean on stdout.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve(config).await?,
        Command::Export { preview } => cli::export::export(&config, preview)?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Reset => cli::reset::reset(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Layout { width, file } => cli::layout::layout(&config, file.as_deref(), width)?,
    }

    Ok(())
}
