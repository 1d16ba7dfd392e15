//! Markfold CLI: AI-assisted bookmark filing.
//!
//! Suggests a category for a web page from your existing folder hierarchy
//! and files the bookmark there, creating missing folders.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
