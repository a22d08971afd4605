//! Geographic points identified by a stable id
//!
//! Provides the [`Point`] type: a postal code (or any other stable
//! identifier) with its latitude and longitude in degrees. Coordinates are
//! validated once at construction; every consumer downstream can assume a
//! finite, in-range position.

use crate::constants::{MAX_LATITUDE_DEG, MAX_LONGITUDE_DEG};
use crate::errors::{GeoError, GeoResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A geographic point with a stable identifier
///
/// # Coordinate System
///
/// - **Latitude**: degrees north of the equator, in [-90, 90]
/// - **Longitude**: degrees east of the prime meridian, in [-180, 180]
///
/// Coordinates are stored in degrees as loaded; the radian accessors
/// convert on demand for trigonometric work.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// Stable identifier, unique within a catalog
    pub id: String,
    /// Latitude in degrees (positive north)
    pub latitude: f64,
    /// Longitude in degrees (positive east)
    pub longitude: f64,
}

impl Point {
    /// Create a new Point with validation
    ///
    /// # Errors
    /// Returns [`GeoError::InvalidCoordinate`] if the id is empty, a
    /// coordinate is NaN or infinite, latitude is outside [-90, 90], or
    /// longitude is outside [-180, 180].
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> GeoResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(GeoError::invalid_coordinate(
                "point",
                "id must not be empty",
            ));
        }
        if !latitude.is_finite() {
            return Err(GeoError::invalid_coordinate(
                &format!("point {}", id),
                "latitude must be finite",
            ));
        }
        if !longitude.is_finite() {
            return Err(GeoError::invalid_coordinate(
                &format!("point {}", id),
                "longitude must be finite",
            ));
        }
        if latitude.abs() > MAX_LATITUDE_DEG {
            return Err(GeoError::invalid_coordinate(
                &format!("point {}", id),
                format!("latitude {} outside [-90, 90]", latitude),
            ));
        }
        if longitude.abs() > MAX_LONGITUDE_DEG {
            return Err(GeoError::invalid_coordinate(
                &format!("point {}", id),
                format!("longitude {} outside [-180, 180]", longitude),
            ));
        }
        Ok(Self {
            id,
            latitude,
            longitude,
        })
    }

    /// Latitude in radians
    pub fn latitude_rad(&self) -> f64 {
        self.latitude.to_radians()
    }

    /// Longitude in radians
    pub fn longitude_rad(&self) -> f64 {
        self.longitude.to_radians()
    }
}
