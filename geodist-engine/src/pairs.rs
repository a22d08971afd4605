//! Canonical pair keys and pair-universe generation.
//!
//! The pair universe over a catalog of N points is every unordered
//! two-element combination, `N*(N-1)/2` pairs. [`PairKey`] is the
//! canonical representation: the two ids sorted lexically, so `(x, y)` and
//! `(y, x)` map to the same row and a pair can never be processed twice.
//!
//! [`ensure_initialized`] materializes the universe into the checkpoint
//! store exactly once, in bounded batches, and is safe to call on every
//! run: a completed store is verified and left alone, an interrupted
//! generation is resumed by re-running the idempotent inserts, and
//! anything else is refused as corrupt rather than reconciled.

use crate::catalog::Catalog;
use crate::errors::{EngineError, EngineResult};
use crate::guard::DiskSpaceGuard;
use crate::store::{CheckpointStore, GenerationState};
use geodist_core::{DistanceAlgorithm, DistanceUnit};

/// Canonical unordered pair of point ids. Always holds `a < b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    a: String,
    b: String,
}

impl PairKey {
    /// Builds the canonical key for an unordered pair, sorting the ids.
    ///
    /// # Errors
    /// [`EngineError::CorruptState`] if both ids are equal; a degenerate
    /// pair can only come from corrupted input.
    pub fn new(x: &str, y: &str) -> EngineResult<Self> {
        match x.cmp(y) {
            std::cmp::Ordering::Less => Ok(Self {
                a: x.to_string(),
                b: y.to_string(),
            }),
            std::cmp::Ordering::Greater => Ok(Self {
                a: y.to_string(),
                b: x.to_string(),
            }),
            std::cmp::Ordering::Equal => Err(EngineError::corrupt(format!(
                "degenerate pair ({}, {})",
                x, y
            ))),
        }
    }

    /// Wraps ids read back from the store, verifying the canonical order
    /// invariant instead of re-sorting: a row with `id1 >= id2` means the
    /// store was written by something else.
    pub(crate) fn from_store_row(a: String, b: String) -> EngineResult<Self> {
        if a < b {
            Ok(Self { a, b })
        } else {
            Err(EngineError::corrupt(format!(
                "work row ({}, {}) violates id1 < id2",
                a, b
            )))
        }
    }

    /// Lexically smaller id.
    pub fn a(&self) -> &str {
        &self.a
    }

    /// Lexically larger id.
    pub fn b(&self) -> &str {
        &self.b
    }
}

/// Number of unordered pairs over a catalog of `n` points.
pub fn universe_size(n: usize) -> u64 {
    let n = n as u64;
    n * (n.saturating_sub(1)) / 2
}

/// Makes sure the store holds exactly the pair universe of `catalog`,
/// generating it if needed. Returns the universe size.
///
/// Idempotent across any number of invocations and restarts. Insert
/// batches are bounded by `gen_batch_size` and each one is preceded by a
/// disk-space check.
///
/// # Errors
/// - [`EngineError::CorruptState`] if the store holds rows with no
///   generation record, records a different catalog or universe size than
///   the loaded catalog implies, or was generated under a different
///   algorithm or unit.
/// - [`EngineError::ResourceExhausted`] if free space drops below the
///   guard's threshold between batches.
pub fn ensure_initialized(
    catalog: &Catalog,
    store: &mut CheckpointStore,
    guard: &DiskSpaceGuard,
    gen_batch_size: usize,
    algorithm: DistanceAlgorithm,
    unit: DistanceUnit,
) -> EngineResult<u64> {
    let expected = universe_size(catalog.len());

    match store.generation_state()? {
        GenerationState::Fresh => {
            let existing = store.total_count()?;
            if existing != 0 {
                return Err(EngineError::corrupt(format!(
                    "work table holds {} rows but no generation record; refusing to reconcile foreign data",
                    existing
                )));
            }
            store.begin_generation(catalog.len() as u64, expected, algorithm, unit)?;
            insert_universe(catalog, store, guard, gen_batch_size)?;
            store.finish_generation(expected)?;
        }
        GenerationState::InProgress {
            catalog_size,
            universe_size: recorded,
        } => {
            check_recorded_sizes(catalog, catalog_size, recorded, expected)?;
            store.check_run_config(algorithm, unit)?;
            // Resume: re-running the full enumeration is a no-op for rows
            // already present.
            insert_universe(catalog, store, guard, gen_batch_size)?;
            store.finish_generation(expected)?;
        }
        GenerationState::Complete {
            catalog_size,
            universe_size: recorded,
        } => {
            check_recorded_sizes(catalog, catalog_size, recorded, expected)?;
            store.check_run_config(algorithm, unit)?;
            let total = store.total_count()?;
            if total != expected {
                return Err(EngineError::corrupt(format!(
                    "store reports generation complete but holds {} pairs, expected {}",
                    total, expected
                )));
            }
        }
    }

    Ok(expected)
}

fn check_recorded_sizes(
    catalog: &Catalog,
    recorded_catalog: u64,
    recorded_universe: u64,
    expected: u64,
) -> EngineResult<()> {
    if recorded_catalog != catalog.len() as u64 || recorded_universe != expected {
        return Err(EngineError::corrupt(format!(
            "store was generated from a catalog of {} points ({} pairs) but the loaded catalog has {} points ({} pairs)",
            recorded_catalog,
            recorded_universe,
            catalog.len(),
            expected
        )));
    }
    Ok(())
}

fn insert_universe(
    catalog: &Catalog,
    store: &mut CheckpointStore,
    guard: &DiskSpaceGuard,
    gen_batch_size: usize,
) -> EngineResult<()> {
    let ids: Vec<&str> = catalog.ids().collect();
    let mut batch = Vec::with_capacity(gen_batch_size);

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            batch.push(PairKey::new(ids[i], ids[j])?);
            if batch.len() >= gen_batch_size {
                guard.check()?;
                store.insert_pending(&batch)?;
                batch.clear();
            }
        }
    }
    if !batch.is_empty() {
        guard.check()?;
        store.insert_pending(&batch)?;
    }
    Ok(())
}
