//! CLI argument definitions for geodist

use clap::{Parser, Subcommand};
use geodist_core::{DistanceAlgorithm, DistanceUnit};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "geodist")]
#[command(about = "Resumable pairwise distance pipeline for geographic point sets")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute all pairwise distances, resuming any prior progress
    Run(RunArgs),

    /// Show progress for an existing distance store
    Status(StatusArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// CSV of points with id/zipcode/postal_code, latitude, longitude columns
    #[arg(long)]
    pub points: PathBuf,

    /// SQLite store holding the pair universe and computed distances
    #[arg(long)]
    pub db: PathBuf,

    /// Pairs computed and committed per batch
    #[arg(long, default_value = "5000")]
    pub batch_size: usize,

    /// Pairs inserted per batch during universe generation
    #[arg(long, default_value = "10000")]
    pub gen_batch_size: usize,

    /// Worker threads for distance computation (0 = all cores)
    #[arg(short, long, default_value = "0")]
    pub threads: usize,

    /// Distance algorithm (haversine | geodesic)
    #[arg(long, default_value = "haversine")]
    pub algorithm: DistanceAlgorithm,

    /// Unit for stored distances (km | miles)
    #[arg(long, default_value = "km")]
    pub unit: DistanceUnit,

    /// Minimum free disk space in MiB before aborting
    #[arg(long, default_value = "512")]
    pub min_free_mib: u64,

    /// Retry a contended batch commit up to N times
    #[arg(long, default_value = "5")]
    pub retries: u32,

    /// Stop after N batches; the store stays resumable
    #[arg(long)]
    pub limit_batches: Option<u64>,

    /// Skip acquiring the OS sleep inhibitor
    #[arg(long)]
    pub no_keep_awake: bool,
}

#[derive(Parser)]
pub struct StatusArgs {
    /// SQLite store to inspect
    #[arg(long)]
    pub db: PathBuf,
}
