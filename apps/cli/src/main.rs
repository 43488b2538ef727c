//! conftrack: keeps a catalog of academic conferences current.
//!
//! Scrapes listing sources, merges them into the catalog and fills missing
//! dates, deadlines and locations from venue pages, web search and an
//! external agent.

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
