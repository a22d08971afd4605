//! geodist: resumable pairwise distance pipeline CLI
//!
//! Computes every pairwise distance over a set of geographic points and
//! checkpoints progress in SQLite, so an interrupted run picks up where
//! it left off.

mod cli;
mod run;
mod status;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => run::run(args, &cli),
        Commands::Status(args) => status::run(args, &cli),
    }
}
