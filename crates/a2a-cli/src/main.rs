//! A2A CLI — serve an agent or talk to one from the terminal.
//!
//! `a2a` — the command-line interface for the A2A task engine.

mod commands;

use clap::Parser;
use commands::{execute, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    execute(cli).await
}
