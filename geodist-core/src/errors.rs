//! Error types for distance calculations.
//!
//! [`GeoError`] covers the failure modes of the pure math layer: invalid
//! coordinates rejected at [`Point`](crate::point::Point) construction,
//! iterative solutions that fail to converge, and unrecognized
//! configuration names.
//!
//! Most functions return [`GeoResult<T>`], which is `Result<T, GeoError>`.

use thiserror::Error;

/// Unified error type for the math layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    /// Coordinate outside its valid domain, non-finite, or otherwise
    /// unusable. Raised at construction so downstream math stays total.
    #[error("invalid coordinate in {context}: {message}")]
    InvalidCoordinate { context: String, message: String },

    /// The iterative geodesic inverse failed to converge. Occurs for
    /// nearly antipodal point pairs.
    #[error("geodesic inverse did not converge after {iterations} iterations")]
    NoConvergence { iterations: u32 },

    /// Unrecognized distance algorithm name.
    #[error("unknown distance algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Unrecognized distance unit name.
    #[error("unknown distance unit: {0}")]
    UnknownUnit(String),
}

/// Convenience alias for `Result<T, GeoError>`.
pub type GeoResult<T> = Result<T, GeoError>;

impl GeoError {
    /// Creates an [`InvalidCoordinate`](Self::InvalidCoordinate) error.
    pub fn invalid_coordinate(context: &str, message: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            context: context.to_string(),
            message: message.into(),
        }
    }
}
