//! Core data types for the hazard risk engine.
//!
//! This module defines the shared domain model imported by all other modules:
//! forecast cells, thresholds, classified cells, asset points, events and
//! summaries. It holds no pipeline logic; the stages that produce these
//! values live under `analysis`.

use std::fmt;

use chrono::{DateTime, Utc};
use geo::{BoundingRect, Point, Polygon, Rect};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::AnalysisError;
use crate::logging::Diagnostic;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Offset between Kelvin and degrees Celsius.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Converts a forecast temperature in Kelvin to degrees Fahrenheit.
pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    (kelvin - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0
}

// ---------------------------------------------------------------------------
// Forecast cells
// ---------------------------------------------------------------------------

/// One weather-grid polygon at one forecast instant.
///
/// Identity is the pair (`geometry_key`, `forecast_time`). Cells are built
/// once by `ingest::forecast` and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCell {
    pub geometry: Polygon<f64>,
    /// Serialized geometry (GeoJSON text), used as the identity key.
    pub geometry_key: String,
    pub forecast_time: DateTime<Utc>,
    /// Wind speed in m/s.
    pub wind_speed: Option<f64>,
    /// Air temperature in Kelvin.
    pub temperature_k: Option<f64>,
}

impl ForecastCell {
    /// Builds a cell from an already-validated polygon, deriving the
    /// geometry key from its GeoJSON serialization.
    pub fn new(
        geometry: Polygon<f64>,
        forecast_time: DateTime<Utc>,
        wind_speed: Option<f64>,
        temperature_k: Option<f64>,
    ) -> Self {
        let geometry_key = crate::geometry::geometry_key(&geometry);
        Self {
            geometry,
            geometry_key,
            forecast_time,
            wind_speed,
            temperature_k,
        }
    }

    /// Same as `new`, but keeps the caller's serialized text as the key.
    /// Used by ingest so the key is exactly what the upstream row carried.
    pub fn with_key(
        geometry: Polygon<f64>,
        geometry_key: String,
        forecast_time: DateTime<Utc>,
        wind_speed: Option<f64>,
        temperature_k: Option<f64>,
    ) -> Self {
        Self {
            geometry,
            geometry_key,
            forecast_time,
            wind_speed,
            temperature_k,
        }
    }

    pub fn identity(&self) -> (&str, DateTime<Utc>) {
        (self.geometry_key.as_str(), self.forecast_time)
    }

    pub fn temperature_f(&self) -> Option<f64> {
        self.temperature_k.map(kelvin_to_fahrenheit)
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Wind-speed cutoffs in m/s. `moderate <= high` is enforced by `new`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub moderate: f64,
    pub high: f64,
}

impl RiskThresholds {
    pub fn new(moderate: f64, high: f64) -> Result<Self, AnalysisError> {
        if !moderate.is_finite() || !high.is_finite() {
            return Err(AnalysisError::InvalidRequest(format!(
                "wind thresholds must be finite (moderate={}, high={})",
                moderate, high
            )));
        }
        if moderate < 0.0 || moderate > high {
            return Err(AnalysisError::InvalidRequest(format!(
                "moderate threshold {} m/s must be non-negative and not above high threshold {} m/s",
                moderate, high
            )));
        }
        Ok(Self { moderate, high })
    }
}

/// Single-threshold temperature hazard, in degrees Fahrenheit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum TemperatureThreshold {
    /// Cold hazard: unsafe when `temp_f <= min_temp_f`.
    Below { min_temp_f: f64 },
    /// Heat hazard: unsafe when `temp_f >= max_temp_f`.
    Above { max_temp_f: f64 },
}

impl TemperatureThreshold {
    pub fn limit(&self) -> f64 {
        match self {
            TemperatureThreshold::Below { min_temp_f } => *min_temp_f,
            TemperatureThreshold::Above { max_temp_f } => *max_temp_f,
        }
    }

    pub fn is_unsafe(&self, temp_f: f64) -> bool {
        match self {
            TemperatureThreshold::Below { min_temp_f } => temp_f <= *min_temp_f,
            TemperatureThreshold::Above { max_temp_f } => temp_f >= *max_temp_f,
        }
    }
}

impl fmt::Display for TemperatureThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureThreshold::Below { min_temp_f } => write!(f, "below {}°F", min_temp_f),
            TemperatureThreshold::Above { max_temp_f } => write!(f, "above {}°F", max_temp_f),
        }
    }
}

// ---------------------------------------------------------------------------
// Classified cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Moderate,
    High,
    Unsafe,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Moderate => write!(f, "Moderate"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Unsafe => write!(f, "Unsafe"),
        }
    }
}

/// A forecast cell that crossed a threshold.
///
/// `value` is the classified quantity: wind speed in m/s, or temperature in
/// °F for the temperature variant. `risk_score` is filled in by
/// `analysis::scoring`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCell {
    pub cell: ForecastCell,
    pub risk_level: RiskLevel,
    pub value: f64,
    pub risk_score: Option<f64>,
}

impl ClassifiedCell {
    pub fn new(cell: ForecastCell, risk_level: RiskLevel, value: f64) -> Self {
        Self {
            cell,
            risk_level,
            value,
            risk_score: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// The point-asset layers the engine knows how to analyze.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetLayer {
    PowerInfrastructure,
    OilWells,
}

impl AssetLayer {
    /// Singular noun used in user-facing messages ("power line data ...").
    pub fn label(&self) -> &'static str {
        match self {
            AssetLayer::PowerInfrastructure => "power line",
            AssetLayer::OilWells => "oil well",
        }
    }
}

impl fmt::Display for AssetLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetLayer::PowerInfrastructure => write!(f, "power infrastructure"),
            AssetLayer::OilWells => write!(f, "oil wells"),
        }
    }
}

/// A physical asset location with its descriptive attributes.
/// Owned by the data layer; read-only to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetPoint {
    pub id: String,
    pub location: Point<f64>,
    pub category: Option<String>,
    pub voltage_kv: Option<f64>,
    pub capacity_mw: Option<f64>,
    pub owner: Option<String>,
}

impl AssetPoint {
    pub fn at(id: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            id: id.into(),
            location: Point::new(lon, lat),
            category: None,
            voltage_kv: None,
            capacity_mw: None,
            owner: None,
        }
    }
}

/// An asset grown by a fixed metric radius and reprojected back to WGS84.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedAsset {
    pub asset_id: String,
    pub radius_m: f64,
    pub geometry: Polygon<f64>,
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// A WGS84 box, serialized as `[[south, west], [north, east]]` for the
/// rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl LatLonBounds {
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            south: rect.min().y,
            west: rect.min().x,
            north: rect.max().y,
            east: rect.max().x,
        }
    }

    pub fn union(&self, other: &LatLonBounds) -> LatLonBounds {
        LatLonBounds {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }

    /// Total bounds of a set of polygons; `None` when the set is empty.
    pub fn of_polygons<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> Option<Self> {
        polygons
            .into_iter()
            .filter_map(|p| p.bounding_rect())
            .map(LatLonBounds::from_rect)
            .reduce(|acc, b| acc.union(&b))
    }

    pub fn as_pairs(&self) -> [[f64; 2]; 2] {
        [[self.south, self.west], [self.north, self.east]]
    }
}

impl Serialize for LatLonBounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_pairs().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Events and summaries
// ---------------------------------------------------------------------------

/// All qualifying cells sharing one forecast timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskEvent {
    pub id: String,
    pub forecast_time: DateTime<Utc>,
    /// Display form, e.g. "2024-05-01 12:00 UTC".
    pub timestamp: String,
    pub high_count: usize,
    pub moderate_count: usize,
    pub max_value: f64,
    /// Estimated affected asset length in km. `None` unless the asset
    /// intersection actually ran; precision is not guaranteed.
    pub affected_estimate_km: Option<f64>,
    pub overall_level: RiskLevel,
}

/// What the engine actually computed, independent of what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisType {
    #[serde(rename = "general")]
    General,
    #[serde(rename = "asset-impact")]
    AssetImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSummary {
    pub risk_found: bool,
    pub message: String,
    pub event_count: usize,
    pub events: Vec<RiskEvent>,
    pub high_risk_areas: usize,
    pub moderate_risk_areas: usize,
    /// Labeled estimate; 0 unless asset intersection was performed.
    pub affected_estimate_km: f64,
    pub analysis_type: AnalysisType,
    pub highest_risk_timestamp: Option<String>,
    pub max_value: Option<f64>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RiskSummary {
    /// A summary reporting that no risk was found, with the reason.
    pub fn not_found(message: impl Into<String>, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            risk_found: false,
            message: message.into(),
            event_count: 0,
            events: Vec::new(),
            high_risk_areas: 0,
            moderate_risk_areas: 0,
            affected_estimate_km: 0.0,
            analysis_type: AnalysisType::General,
            highest_risk_timestamp: None,
            max_value: None,
            diagnostics,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
