//! Run subcommand: load the catalog, materialize the pair universe,
//! drive the batch loop to completion.

use crate::cli::{Cli, RunArgs};
use anyhow::Context;
use geodist_engine::{
    ensure_initialized, keep_awake, universe_size, BatchRunner, Catalog, CheckpointStore,
    DiskSpaceGuard, EngineConfig, RetryPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};

pub fn run(args: &RunArgs, cli: &Cli) -> anyhow::Result<()> {
    let catalog = Catalog::load(&args.points)
        .with_context(|| format!("Failed to load points from {:?}", args.points))?;
    print_plan(args, catalog.len());

    let config = EngineConfig {
        batch_size: args.batch_size,
        gen_batch_size: args.gen_batch_size,
        concurrency: args.threads,
        algorithm: args.algorithm,
        unit: args.unit,
        min_free_bytes: args.min_free_mib * 1024 * 1024,
        retry: RetryPolicy {
            max_retries: args.retries,
            ..RetryPolicy::default()
        },
    };

    let guard = DiskSpaceGuard::for_store(&args.db, config.min_free_bytes);
    guard.check().context("Pre-flight disk space check failed")?;

    let awake = if args.no_keep_awake {
        None
    } else {
        let awake = keep_awake();
        if cli.verbose && !awake.is_active() {
            eprintln!("Sleep inhibitor unavailable, continuing without it");
        }
        Some(awake)
    };

    let mut store = CheckpointStore::open(&args.db)
        .with_context(|| format!("Failed to open store {:?}", args.db))?;
    let total = ensure_initialized(
        &catalog,
        &mut store,
        &guard,
        config.gen_batch_size,
        config.algorithm,
        config.unit,
    )
    .context("Failed to initialize pair universe")?;

    let remaining = store.remaining_count()?;
    if remaining == 0 {
        println!("All {} pairs already computed.", total);
        return Ok(());
    }
    if cli.verbose {
        eprintln!("{} of {} pairs pending", remaining, total);
    }

    let pb = create_progress_bar(remaining);
    let mut runner = BatchRunner::new(&catalog, &mut store, guard, config)?;
    let mut batches = 0u64;
    let mut committed = 0u64;
    let mut retries = 0u64;
    let mut fallbacks = 0u64;

    while let Some(batch) = runner
        .step()
        .with_context(|| format!("Batch {} failed", batches + 1))?
    {
        batches += 1;
        committed += batch.committed;
        retries += u64::from(batch.retries);
        fallbacks += batch.spherical_fallbacks;
        pb.inc(batch.committed);
        if args.limit_batches.is_some_and(|limit| batches >= limit) {
            break;
        }
    }
    pb.finish_with_message("Done");
    drop(runner);
    drop(awake);

    let left = store.remaining_count()?;
    print_summary(batches, committed, retries, fallbacks, left);
    Ok(())
}

fn print_plan(args: &RunArgs, point_count: usize) {
    println!("=== Pairwise Distance Run ===");
    println!("Points file: {:?}", args.points);
    println!("Points loaded: {}", point_count);
    println!("Pair universe: {}", universe_size(point_count));
    println!("Store: {:?}", args.db);
    println!("Algorithm: {}", args.algorithm);
    println!("Unit: {}", args.unit);
    println!("Batch size: {}", args.batch_size);
    if args.threads == 0 {
        println!("Threads: all cores");
    } else {
        println!("Threads: {}", args.threads);
    }
    println!();
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

fn print_summary(batches: u64, committed: u64, retries: u64, fallbacks: u64, remaining: u64) {
    println!();
    println!("=== Summary ===");
    println!("Batches committed: {}", batches);
    println!("Pairs computed: {}", committed);
    println!("Pairs remaining: {}", remaining);
    if retries > 0 {
        println!("Commit retries: {}", retries);
    }
    if fallbacks > 0 {
        println!("Spherical fallbacks: {}", fallbacks);
    }
    if remaining == 0 {
        println!("Run complete.");
    } else {
        println!("Run paused; invoke again to continue.");
    }
}
