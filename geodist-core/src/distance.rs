//! Great-circle and geodesic distance between two points.
//!
//! Two algorithms are offered, selected by [`DistanceAlgorithm`]:
//!
//! - [`haversine_km`] treats Earth as a sphere of radius
//!   [`EARTH_MEAN_RADIUS_KM`]. Fast, total for valid points, worst-case
//!   error around 0.5%.
//! - [`vincenty_km`] solves the inverse geodesic problem on the WGS84
//!   ellipsoid. Higher precision, iterative, and fails with
//!   [`GeoError::NoConvergence`] for nearly antipodal pairs.
//!
//! Both return kilometers. [`DistanceUnit::from_km`] converts at the edge.
//! Both are deterministic and side-effect-free: the same pair of points
//! always yields the same distance, which is what makes batch computation
//! safely parallelizable and restartable.

use crate::constants::{EARTH_MEAN_RADIUS_KM, KM_PER_MILE, WGS84_A_M, WGS84_B_M, WGS84_F};
use crate::errors::{GeoError, GeoResult};
use crate::point::Point;
use std::fmt;
use std::str::FromStr;

const VINCENTY_MAX_ITERATIONS: u32 = 100;
const VINCENTY_TOLERANCE: f64 = 1e-12;

/// Distance algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceAlgorithm {
    /// Spherical model, haversine formula.
    Haversine,
    /// WGS84 ellipsoidal model, Vincenty inverse.
    Geodesic,
}

impl fmt::Display for DistanceAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Haversine => write!(f, "haversine"),
            Self::Geodesic => write!(f, "geodesic"),
        }
    }
}

impl FromStr for DistanceAlgorithm {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haversine" => Ok(Self::Haversine),
            "geodesic" | "vincenty" => Ok(Self::Geodesic),
            other => Err(GeoError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Unit for reported distances. Computation happens in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Kilometers,
    Miles,
}

impl DistanceUnit {
    /// Converts a distance in kilometers to this unit.
    pub fn from_km(self, km: f64) -> f64 {
        match self {
            Self::Kilometers => km,
            Self::Miles => km / KM_PER_MILE,
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kilometers => write!(f, "km"),
            Self::Miles => write!(f, "miles"),
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "km" | "kilometers" => Ok(Self::Kilometers),
            "mi" | "miles" => Ok(Self::Miles),
            other => Err(GeoError::UnknownUnit(other.to_string())),
        }
    }
}

/// Computes the distance between two points in kilometers using the
/// selected algorithm.
///
/// # Errors
/// [`GeoError::NoConvergence`] if the geodesic algorithm fails to converge
/// (nearly antipodal pairs). The haversine algorithm never fails.
pub fn distance_km(algorithm: DistanceAlgorithm, p1: &Point, p2: &Point) -> GeoResult<f64> {
    match algorithm {
        DistanceAlgorithm::Haversine => Ok(haversine_km(p1, p2)),
        DistanceAlgorithm::Geodesic => vincenty_km(p1, p2),
    }
}

/// Great-circle distance in kilometers on a sphere of radius
/// [`EARTH_MEAN_RADIUS_KM`].
pub fn haversine_km(p1: &Point, p2: &Point) -> f64 {
    let lat1 = p1.latitude_rad();
    let lat2 = p2.latitude_rad();
    let dlat = lat2 - lat1;
    let dlon = p2.longitude_rad() - p1.longitude_rad();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * libm::atan2(libm::sqrt(a), libm::sqrt(1.0 - a));

    EARTH_MEAN_RADIUS_KM * c
}

/// Geodesic distance in kilometers on the WGS84 ellipsoid, by Vincenty's
/// inverse formula.
///
/// # Errors
/// [`GeoError::NoConvergence`] when the lambda iteration does not settle
/// within the iteration cap. This happens for nearly antipodal pairs,
/// where the inverse problem is ill-conditioned.
pub fn vincenty_km(p1: &Point, p2: &Point) -> GeoResult<f64> {
    let l = p2.longitude_rad() - p1.longitude_rad();
    let u1 = ((1.0 - WGS84_F) * p1.latitude_rad().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * p2.latitude_rad().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut iterations = 0u32;

    loop {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // Coincident points
            return Ok(0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial line: cos_sq_alpha is zero and the 2*sigma_m term drops out
        let cos_2sigma_m = if cos_sq_alpha.abs() < f64::EPSILON {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let lambda_prev = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m
                            + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if (lambda - lambda_prev).abs() < VINCENTY_TOLERANCE {
            let u_sq = cos_sq_alpha * (WGS84_A_M * WGS84_A_M - WGS84_B_M * WGS84_B_M)
                / (WGS84_B_M * WGS84_B_M);
            let a_term =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let b_term = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = b_term
                * sin_sigma
                * (cos_2sigma_m
                    + b_term / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                            - b_term / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                                * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
            let meters = WGS84_B_M * a_term * (sigma - delta_sigma);
            return Ok(meters / 1000.0);
        }

        iterations += 1;
        if iterations >= VINCENTY_MAX_ITERATIONS {
            return Err(GeoError::NoConvergence { iterations });
        }
    }
}
