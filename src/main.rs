//! Main entry point for the epubstrip CLI application.
//!
//! Dispatches one subcommand per pipeline stage; any error propagates
//! here, gets printed, and the process exits with status 1.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use epubstrip::epub::{archive, entities, pipeline, sanitize};
use epubstrip::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Extract { archive } => {
            archive::extract_archive(&archive)?;
        }
        Command::Clean { directory } => {
            sanitize::clean_directory(&directory)?;
        }
        Command::DecodeEntities { directory } => {
            entities::decode_directory(&directory)?;
        }
        Command::Process {
            archive,
            fetch_cover,
        } => {
            pipeline::process_epub(&archive, fetch_cover).await?;
        }
    }

    Ok(())
}
