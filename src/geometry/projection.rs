//! Web Mercator (EPSG:3857) transforms.
//!
//! Buffering happens in Web Mercator so asset buffers are expressed in
//! meters. Mercator distances are inflated by `1 / cos(lat)`, so a 500 m
//! buffer covers somewhat less ground away from the equator; that is the
//! same behavior as buffering in EPSG:3857 with any GIS toolkit.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use geo::Point;

use super::GeometryProvider;
use crate::error::AnalysisError;

/// WGS84 semi-major axis, the sphere radius used by EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes square; beyond it the projection
/// is undefined for our purposes.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Largest valid easting/northing magnitude.
const MAX_MERCATOR_EXTENT: f64 = 20_037_508.342_789_244;

pub fn lonlat_to_mercator(lon: f64, lat: f64) -> Result<(f64, f64), AnalysisError> {
    if !(lon.is_finite() && lat.is_finite()) {
        return Err(AnalysisError::Reprojection(format!(
            "non-finite coordinate ({}, {})",
            lon, lat
        )));
    }
    if lat.abs() > MAX_MERCATOR_LAT || lon.abs() > 180.0 {
        return Err(AnalysisError::Reprojection(format!(
            "coordinate ({}, {}) is outside the Web Mercator domain",
            lon, lat
        )));
    }
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    Ok((x, y))
}

pub fn mercator_to_lonlat(x: f64, y: f64) -> Result<(f64, f64), AnalysisError> {
    if !(x.is_finite() && y.is_finite()) {
        return Err(AnalysisError::Reprojection(format!(
            "non-finite metric coordinate ({}, {})",
            x, y
        )));
    }
    if x.abs() > MAX_MERCATOR_EXTENT * (1.0 + 1e-9) {
        return Err(AnalysisError::Reprojection(format!(
            "easting {} is outside the Web Mercator extent",
            x
        )));
    }
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    Ok((lon, lat))
}

/// Conservative half-width, in degrees, of the WGS84 box that contains a
/// Web Mercator buffer of `radius_m`. Used for the cheap bounding-box stage
/// before buffering.
pub fn buffer_margin_degrees(radius_m: f64) -> f64 {
    (radius_m / EARTH_RADIUS_M).to_degrees()
}

// ---------------------------------------------------------------------------
// Default provider
// ---------------------------------------------------------------------------

/// The default `GeometryProvider`: buffers in EPSG:3857 and evaluates
/// predicates with `geo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebMercator {
    pub segments: usize,
}

impl Default for WebMercator {
    fn default() -> Self {
        Self { segments: 32 }
    }
}

impl WebMercator {
    pub fn with_segments(segments: usize) -> Self {
        Self { segments }
    }
}

impl GeometryProvider for WebMercator {
    fn to_metric(&self, point: Point<f64>) -> Result<Point<f64>, AnalysisError> {
        let (x, y) = lonlat_to_mercator(point.x(), point.y())?;
        Ok(Point::new(x, y))
    }

    fn to_wgs84(&self, point: Point<f64>) -> Result<Point<f64>, AnalysisError> {
        let (lon, lat) = mercator_to_lonlat(point.x(), point.y())?;
        Ok(Point::new(lon, lat))
    }

    fn buffer_segments(&self) -> usize {
        self.segments
    }
}
