//! Geometry collaborator: parsing, validation, reprojection, buffering and
//! intersection predicates.
//!
//! Pipeline stages never call `geo` predicates directly for the operations
//! that can fail (reprojection, buffering, joins); they go through a
//! `GeometryProvider` so a caller can swap the implementation and so every
//! failure surfaces as a typed `AnalysisError`.
//!
//! Submodules:
//! - `projection`: Web Mercator transforms and the default provider.
//! - `index`: R-tree over bounding boxes for the coarse filter stage.

pub mod index;
pub mod projection;

use geo::{Area, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use geojson::GeoJson;

use crate::error::AnalysisError;

pub use index::EnvelopeIndex;
pub use projection::WebMercator;

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Reprojection, buffering and intersects predicates used by the pipeline.
///
/// Only `to_metric` and `to_wgs84` are required; the rest have default
/// implementations built on them.
pub trait GeometryProvider {
    /// WGS84 lon/lat → metric CRS.
    fn to_metric(&self, point: Point<f64>) -> Result<Point<f64>, AnalysisError>;

    /// Metric CRS → WGS84 lon/lat.
    fn to_wgs84(&self, point: Point<f64>) -> Result<Point<f64>, AnalysisError>;

    /// Vertices used to approximate a circular buffer.
    fn buffer_segments(&self) -> usize {
        32
    }

    /// Grows a WGS84 point by `radius_m` in the metric CRS and returns the
    /// buffer as a WGS84 polygon.
    fn buffer_point(&self, point: Point<f64>, radius_m: f64) -> Result<Polygon<f64>, AnalysisError> {
        let center = self.to_metric(point)?;
        let metric_circle = circle_polygon(center, radius_m, self.buffer_segments())?;
        let ring = metric_circle
            .exterior()
            .points()
            .map(|p| self.to_wgs84(p).map(Coord::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(LineString::from(ring), vec![]))
    }

    /// Checks that every vertex of a WGS84 polygon is representable in the
    /// metric CRS.
    fn check_projectable(&self, polygon: &Polygon<f64>) -> Result<(), AnalysisError> {
        for point in polygon.exterior().points() {
            self.to_metric(point)?;
        }
        Ok(())
    }

    fn intersects(&self, a: &Polygon<f64>, b: &Polygon<f64>) -> Result<bool, AnalysisError> {
        Ok(a.intersects(b))
    }

    fn point_intersects(&self, point: &Point<f64>, polygon: &Polygon<f64>) -> Result<bool, AnalysisError> {
        Ok(polygon.intersects(point))
    }
}

/// Regular `segments`-gon of radius `radius` around `center`, in whatever
/// planar units the center is expressed in.
pub fn circle_polygon(center: Point<f64>, radius: f64, segments: usize) -> Result<Polygon<f64>, AnalysisError> {
    if !(radius.is_finite() && radius > 0.0) {
        return Err(AnalysisError::Buffer(format!(
            "buffer radius must be a positive distance, got {}",
            radius
        )));
    }
    if segments < 3 {
        return Err(AnalysisError::Buffer(format!(
            "a buffer needs at least 3 segments, got {}",
            segments
        )));
    }
    if !(center.x().is_finite() && center.y().is_finite()) {
        return Err(AnalysisError::Buffer("buffer center is not finite".into()));
    }

    let mut ring: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / segments as f64;
            Coord {
                x: center.x() + radius * angle.cos(),
                y: center.y() + radius * angle.sin(),
            }
        })
        .collect();
    ring.push(ring[0]);
    Ok(Polygon::new(LineString::from(ring), vec![]))
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// GeoJSON text of a polygon, used as the geometry identity key.
pub fn geometry_key(polygon: &Polygon<f64>) -> String {
    geojson::Geometry::new(geojson::Value::from(polygon)).to_string()
}

fn parse_geo_geometry(text: &str) -> Result<geo::Geometry<f64>, String> {
    let parsed: GeoJson = text.trim().parse().map_err(|e: geojson::Error| e.to_string())?;
    let geometry = match parsed {
        GeoJson::Geometry(g) => g,
        GeoJson::Feature(f) => f.geometry.ok_or_else(|| "feature has no geometry".to_string())?,
        GeoJson::FeatureCollection(_) => {
            return Err("expected a single geometry, got a FeatureCollection".to_string());
        }
    };
    geo::Geometry::<f64>::try_from(geometry).map_err(|e| e.to_string())
}

/// Parses and validates a GeoJSON polygon (bare geometry or feature).
pub fn parse_polygon(text: &str) -> Result<Polygon<f64>, String> {
    match parse_geo_geometry(text)? {
        geo::Geometry::Polygon(polygon) => {
            validate_polygon(&polygon)?;
            Ok(polygon)
        }
        _ => Err("expected a Polygon geometry".to_string()),
    }
}

/// Parses a GeoJSON point and checks it is a valid lon/lat.
pub fn parse_point(text: &str) -> Result<Point<f64>, String> {
    match parse_geo_geometry(text)? {
        geo::Geometry::Point(point) => {
            validate_lon_lat(point.x(), point.y())?;
            Ok(point)
        }
        _ => Err("expected a Point geometry".to_string()),
    }
}

/// Parses a region boundary; single polygons are promoted to multipolygons.
pub fn parse_region_geometry(geometry: geojson::Geometry) -> Result<MultiPolygon<f64>, String> {
    let multi = match geo::Geometry::<f64>::try_from(geometry).map_err(|e| e.to_string())? {
        geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        geo::Geometry::MultiPolygon(mp) => mp,
        _ => return Err("region boundary must be a Polygon or MultiPolygon".to_string()),
    };
    for polygon in &multi.0 {
        validate_polygon(polygon)?;
    }
    Ok(multi)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_lon_lat(lon: f64, lat: f64) -> Result<(), String> {
    if !(lon.is_finite() && lat.is_finite()) {
        return Err("coordinate is not finite".to_string());
    }
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("coordinate ({}, {}) is outside WGS84 range", lon, lat));
    }
    Ok(())
}

/// A polygon is usable when its exterior is a closed ring of at least four
/// valid WGS84 coordinates enclosing non-zero area.
pub fn validate_polygon(polygon: &Polygon<f64>) -> Result<(), String> {
    let exterior = polygon.exterior();
    if exterior.0.len() < 4 {
        return Err(format!(
            "exterior ring has {} coordinates, need at least 4",
            exterior.0.len()
        ));
    }
    for coord in polygon.exterior().coords().chain(polygon.interiors().iter().flat_map(|r| r.coords())) {
        validate_lon_lat(coord.x, coord.y)?;
    }
    if polygon.unsigned_area() <= 0.0 {
        return Err("polygon has zero area".to_string());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
