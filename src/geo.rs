//! Coordinates, great-circle distance and display jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Mean Earth radius used by [`distance_meters`].
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_111.0;

/// A WGS84 point.  Ranges are not enforced, but NaN / infinite components
/// are rejected by [`Coordinate::try_new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self> {
        let c = Self::new(latitude, longitude);
        if !c.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "coordinate must be finite, got ({latitude}, {longitude})"
            )));
        }
        Ok(c)
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Haversine distance in meters.  Symmetric, and exactly zero for
/// identical points.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    // abs() keeps distance(a, b) and distance(b, a) bit-identical.
    let dlat = (b.latitude - a.latitude).abs().to_radians();
    let dlon = (b.longitude - a.longitude).abs().to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Offset `center` by up to `max_meters` on each axis.
///
/// Longitude degrees are corrected for latitude:
/// `Δlng = Δm / (111111 · |cos(lat)|)`.
pub fn jitter<R: Rng + ?Sized>(center: Coordinate, max_meters: f64, rng: &mut R) -> Coordinate {
    let m = max_meters.max(0.0);
    let dlat_m: f64 = rng.gen_range(-m..=m);
    let dlng_m: f64 = rng.gen_range(-m..=m);

    let lng_scale = METERS_PER_DEGREE * center.latitude.to_radians().cos().abs();
    let dlng = if lng_scale > f64::EPSILON {
        dlng_m / lng_scale
    } else {
        0.0
    };

    Coordinate::new(
        center.latitude + dlat_m / METERS_PER_DEGREE,
        center.longitude + dlng,
    )
}
