//! Proposalgen CLI: AI adoption proposals from company research.
//!
//! Runs the four-stage proposal pipeline for a company and industry,
//! writes the consolidated report, and keeps a local history of runs.

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
