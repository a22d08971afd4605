//! Batch-processing loop: pull pending pairs, compute, commit.
//!
//! The runner owns the whole processing loop between the catalog and the
//! checkpoint store. Each step is one crash-safe unit of work:
//!
//! 1. Disk-space check (abort early, not mid-write).
//! 2. Pull a bounded batch of pending pairs.
//! 3. Resolve coordinates and compute distances across the worker pool.
//!    Workers share nothing mutable; results are gathered before any
//!    write happens.
//! 4. Commit the batch in a single transaction, retrying transient lock
//!    contention with bounded exponential backoff.
//!
//! The only mutating step is the commit, and it is atomic, so the process
//! can die at any point without corrupting the store. Re-invoking the
//! runner on the same store converges: completed pairs are never pulled
//! again, and the loop terminates when nothing is pending.

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::guard::DiskSpaceGuard;
use crate::pairs::PairKey;
use crate::store::CheckpointStore;
use geodist_core::{haversine_km, vincenty_km, DistanceAlgorithm, GeoError, Point};
use rayon::prelude::*;
use std::thread;

/// Outcome of one committed batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReport {
    /// Pairs computed and marked done.
    pub committed: u64,
    /// Transient commit failures retried for this batch.
    pub retries: u32,
    /// Pairs where the geodesic inverse failed to converge and the
    /// spherical result was recorded instead.
    pub spherical_fallbacks: u64,
}

/// Accumulated outcome of a full run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    pub batches: u64,
    pub committed: u64,
    pub retries: u64,
    pub spherical_fallbacks: u64,
    /// Pairs still pending when the run stopped. Zero means the universe
    /// is complete.
    pub remaining: u64,
}

/// Drives the pull/compute/commit loop against a single store.
pub struct BatchRunner<'a> {
    catalog: &'a Catalog,
    store: &'a mut CheckpointStore,
    guard: DiskSpaceGuard,
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl<'a> BatchRunner<'a> {
    /// Builds the runner and its worker pool.
    pub fn new(
        catalog: &'a Catalog,
        store: &'a mut CheckpointStore,
        guard: DiskSpaceGuard,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(resolve_threads(config.concurrency))
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;
        Ok(Self {
            catalog,
            store,
            guard,
            config,
            pool,
        })
    }

    /// Processes one batch. Returns `None` when no pairs are pending.
    pub fn step(&mut self) -> EngineResult<Option<BatchReport>> {
        self.guard.check()?;

        let batch = self.store.pull_pending(self.config.batch_size)?;
        if batch.is_empty() {
            return Ok(None);
        }

        let (results, spherical_fallbacks) = self.compute_batch(batch)?;
        let retries = self.commit_with_retry(&results)?;

        Ok(Some(BatchReport {
            committed: results.len() as u64,
            retries,
            spherical_fallbacks,
        }))
    }

    /// Runs to exhaustion, or until `limit_batches` batches have been
    /// committed. Always leaves the store in a resumable state.
    pub fn run(&mut self, limit_batches: Option<u64>) -> EngineResult<RunReport> {
        let mut report = RunReport::default();
        while limit_batches.map_or(true, |limit| report.batches < limit) {
            match self.step()? {
                Some(batch) => {
                    report.batches += 1;
                    report.committed += batch.committed;
                    report.retries += u64::from(batch.retries);
                    report.spherical_fallbacks += batch.spherical_fallbacks;
                }
                None => break,
            }
        }
        report.remaining = self.store.remaining_count()?;
        Ok(report)
    }

    fn compute_batch(&self, batch: Vec<PairKey>) -> EngineResult<(Vec<(PairKey, f64)>, u64)> {
        // Resolve serially before fanning out: a miss here means the work
        // table references a point the catalog does not have, which is a
        // store/catalog mismatch, not a per-pair condition.
        let mut resolved: Vec<(PairKey, &Point, &Point)> = Vec::with_capacity(batch.len());
        for pair in batch {
            let p1 = self.resolve(pair.a())?;
            let p2 = self.resolve(pair.b())?;
            resolved.push((pair, p1, p2));
        }

        let algorithm = self.config.algorithm;
        let unit = self.config.unit;
        let computed: Vec<(PairKey, f64, bool)> = self.pool.install(|| {
            resolved
                .into_par_iter()
                .map(|(pair, p1, p2)| {
                    let (km, fallback) = compute_km(algorithm, p1, p2)?;
                    Ok((pair, unit.from_km(km), fallback))
                })
                .collect::<EngineResult<Vec<_>>>()
        })?;

        let spherical_fallbacks = computed.iter().filter(|(_, _, f)| *f).count() as u64;
        let results = computed
            .into_iter()
            .map(|(pair, distance, _)| (pair, distance))
            .collect();
        Ok((results, spherical_fallbacks))
    }

    fn resolve(&self, id: &str) -> EngineResult<&'a Point> {
        self.catalog.lookup(id).map_err(|_| {
            EngineError::corrupt(format!("work table references unknown point id {:?}", id))
        })
    }

    fn commit_with_retry(&mut self, results: &[(PairKey, f64)]) -> EngineResult<u32> {
        let mut retries = 0u32;
        loop {
            match self.store.commit_results(results) {
                Ok(()) => return Ok(retries),
                Err(e) if e.is_transient() && retries < self.config.retry.max_retries => {
                    retries += 1;
                    thread::sleep(self.config.retry.delay_for(retries));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn resolve_threads(threads: usize) -> usize {
    if threads == 0 {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    } else {
        threads
    }
}

fn compute_km(algorithm: DistanceAlgorithm, p1: &Point, p2: &Point) -> EngineResult<(f64, bool)> {
    match algorithm {
        DistanceAlgorithm::Haversine => Ok((haversine_km(p1, p2), false)),
        DistanceAlgorithm::Geodesic => match vincenty_km(p1, p2) {
            Ok(km) => Ok((km, false)),
            // Nearly antipodal pair: record the spherical result rather
            // than leaving the pair stuck pending forever.
            Err(GeoError::NoConvergence { .. }) => Ok((haversine_km(p1, p2), true)),
            Err(e) => Err(e.into()),
        },
    }
}
