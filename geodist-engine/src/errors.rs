//! Error types for the pairwise distance engine.
//!
//! The taxonomy separates errors by what an operator can do about them:
//!
//! | Variant | Meaning | Recoverable? |
//! |---------|---------|--------------|
//! | [`Data`](EngineError::Data) | Malformed or missing catalog input | No, fix the input |
//! | [`UnknownPoint`](EngineError::UnknownPoint) | Lookup miss against the catalog | No |
//! | [`CorruptState`](EngineError::CorruptState) | Store contents disagree with the catalog | No, operator intervention |
//! | [`ResourceExhausted`](EngineError::ResourceExhausted) | Free disk below threshold | Yes, free space and re-run |
//! | [`Store`](EngineError::Store) | SQLite failure | Retried when transient |
//!
//! Every fatal error leaves the store in a valid state: the commit path is
//! a single transaction, so an aborted run never strands a half-written
//! batch. [`EngineError::is_transient`] identifies the lock-contention
//! class of store failures that the batch runner retries with backoff.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for catalog loading, pair generation, and the
/// batch-processing loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or incomplete catalog data. Raised before any store
    /// mutation.
    #[error("catalog data error in {source_name}: {message}")]
    Data { source_name: String, message: String },

    /// A point id was not found in the catalog.
    #[error("unknown point id: {id}")]
    UnknownPoint { id: String },

    /// The checkpoint store contents cannot be reconciled with the
    /// catalog. Never auto-repaired.
    #[error("corrupt checkpoint state: {0}")]
    CorruptState(String),

    /// Free disk space fell below the configured threshold. Fatal for the
    /// current run; the store stays valid and the run is resumable once
    /// space is available.
    #[error("insufficient disk space at {path:?}: {available} bytes available, {required} required")]
    ResourceExhausted {
        path: PathBuf,
        available: u64,
        required: u64,
    },

    /// Underlying SQLite failure.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Worker pool construction failure.
    #[error("thread pool error: {0}")]
    ThreadPool(String),

    /// Filesystem failure outside the store itself.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure from the distance math layer.
    #[error(transparent)]
    Geo(#[from] geodist_core::GeoError),
}

/// Convenience alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Creates a [`Data`](Self::Data) error.
    pub fn data(source_name: &str, message: impl Into<String>) -> Self {
        Self::Data {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Creates a [`CorruptState`](Self::CorruptState) error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptState(message.into())
    }

    /// Returns `true` if retrying the failed operation may succeed.
    ///
    /// Only lock-contention store failures qualify; everything else is
    /// fatal for the current run.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
