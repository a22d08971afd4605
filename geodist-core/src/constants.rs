//! Physical constants for terrestrial distance calculations
//!
//! Values follow internationally accepted geodetic standards and carry
//! enough precision for the algorithms in [`crate::distance`].

// WGS84 Earth ellipsoid parameters (EPSG:4326)
// Reference: NIMA TR8350.2, "Department of Defense World Geodetic System 1984"

/// Semi-major axis of the WGS84 ellipsoid in meters
///
/// Value: 6 378 137 m exactly (defining parameter)
pub const WGS84_A_M: f64 = 6_378_137.0;

/// Flattening of the WGS84 ellipsoid
///
/// Defining parameter: 1/298.257223563
pub const WGS84_F: f64 = 1.0 / 298.257223563;

/// Semi-minor axis of the WGS84 ellipsoid in meters
///
/// Pre-computed from a * (1 - f).
pub const WGS84_B_M: f64 = 6_356_752.314245179;

/// Mean Earth radius in kilometers for the spherical distance model
///
/// The conventional value used with the haversine formula. Treating Earth
/// as a sphere of this radius keeps worst-case error around 0.5%.
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

// Unit conversions

/// Kilometers in one international mile (exact)
pub const KM_PER_MILE: f64 = 1.609344;

// Coordinate domain limits, in degrees

/// Maximum absolute latitude
pub const MAX_LATITUDE_DEG: f64 = 90.0;

/// Maximum absolute longitude
pub const MAX_LONGITUDE_DEG: f64 = 180.0;
