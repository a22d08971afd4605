//! Resumable all-pairs distance computation over a durable checkpoint
//! store.
//!
//! Given a catalog of geographic points (postal codes with coordinates),
//! the engine materializes the universe of unordered pairs into a SQLite
//! work table, then computes distances batch by batch, committing each
//! batch's results and done-flags in a single transaction. A run can be
//! killed at any moment and re-invoked: completed pairs are never
//! recomputed, and the union of results across interrupted runs equals a
//! single uninterrupted run.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Immutable in-memory [`Catalog`] loaded from CSV |
//! | [`pairs`] | Canonical [`PairKey`], universe generation ([`ensure_initialized`]) |
//! | [`store`] | [`CheckpointStore`]: durable work table with atomic batch commit |
//! | [`runner`] | [`BatchRunner`]: pull/compute/commit loop with retry |
//! | [`guard`] | [`DiskSpaceGuard`] and sleep inhibition ([`keep_awake`]) |
//! | [`config`] | [`EngineConfig`] and [`RetryPolicy`] tunables |
//! | [`errors`] | [`EngineError`] taxonomy and [`EngineResult`] |
//!
//! # Quick Start
//!
//! ```no_run
//! use geodist_engine::{
//!     ensure_initialized, BatchRunner, Catalog, CheckpointStore, DiskSpaceGuard, EngineConfig,
//! };
//!
//! let catalog = Catalog::load("points.csv")?;
//! let mut store = CheckpointStore::open("distances.db")?;
//! let config = EngineConfig::default();
//! let guard = DiskSpaceGuard::for_store("distances.db".as_ref(), config.min_free_bytes);
//!
//! ensure_initialized(
//!     &catalog,
//!     &mut store,
//!     &guard,
//!     config.gen_batch_size,
//!     config.algorithm,
//!     config.unit,
//! )?;
//!
//! let mut runner = BatchRunner::new(&catalog, &mut store, guard, config)?;
//! let report = runner.run(None)?;
//! assert_eq!(report.remaining, 0);
//! # Ok::<(), geodist_engine::EngineError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod errors;
pub mod guard;
pub mod pairs;
pub mod runner;
pub mod store;

pub use catalog::{normalize_id, Catalog};
pub use config::{EngineConfig, RetryPolicy};
pub use errors::{EngineError, EngineResult};
pub use guard::{keep_awake, AwakeGuard, DiskSpaceGuard, Inhibitor};
pub use pairs::{ensure_initialized, universe_size, PairKey};
pub use runner::{BatchReport, BatchRunner, RunReport};
pub use store::{CheckpointStore, GenerationState};
