//! Pagecraft CLI — render exercise-style markdown into interactive pages.
//!
//! Splits solutions out of normal flow, converts markdown to sanitized HTML,
//! and builds whole content trees into a static output directory.

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
