//! Status subcommand: read-only progress report for an existing store

use crate::cli::{Cli, StatusArgs};
use anyhow::Context;
use geodist_engine::{CheckpointStore, GenerationState};

pub fn run(args: &StatusArgs, _cli: &Cli) -> anyhow::Result<()> {
    let store = CheckpointStore::open_read_only(&args.db)
        .with_context(|| format!("Failed to open store {:?}", args.db))?;

    println!("Store: {:?}", args.db);
    match store.generation_state()? {
        GenerationState::Fresh => {
            println!("No pair universe generated yet.");
        }
        GenerationState::InProgress { universe_size, .. } => {
            let total = store.total_count()?;
            println!(
                "Generation in progress: {} of {} pairs inserted",
                total, universe_size
            );
        }
        GenerationState::Complete {
            catalog_size,
            universe_size,
        } => {
            let remaining = store.remaining_count()?;
            let done = universe_size.saturating_sub(remaining);
            let pct = if universe_size > 0 {
                done as f64 / universe_size as f64 * 100.0
            } else {
                100.0
            };
            println!("Catalog points: {}", catalog_size);
            println!("Pair universe: {}", universe_size);
            println!("Computed: {} ({:.1}%)", done, pct);
            println!("Remaining: {}", remaining);
            if let Some(algorithm) = store.recorded_algorithm()? {
                println!("Algorithm: {}", algorithm);
            }
            if let Some(unit) = store.recorded_unit()? {
                println!("Unit: {}", unit);
            }
        }
    }
    Ok(())
}
