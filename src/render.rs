//! Serializable payloads for the rendering collaborator.
//!
//! The map layer receives event-id → cells (geometry, level, score, value),
//! the summary record, and a list of `[[south, west], [north, east]]`
//! boxes that it unions to fit the view.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use geo::Polygon;
use serde::{Serialize, Serializer};

use crate::analysis::wind::WindRiskResult;
use crate::model::{ClassifiedCell, LatLonBounds, RiskLevel, RiskSummary};

/// Serializes a polygon as a GeoJSON geometry object.
pub fn serialize_polygon<S: Serializer>(polygon: &Polygon<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    geojson::Geometry::new(geojson::Value::from(polygon)).serialize(serializer)
}

// ---------------------------------------------------------------------------
// Wind map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedCell {
    #[serde(serialize_with = "serialize_polygon")]
    pub geometry: Polygon<f64>,
    pub forecast_time: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub value: f64,
}

impl From<&ClassifiedCell> for RenderedCell {
    fn from(cell: &ClassifiedCell) -> Self {
        Self {
            geometry: cell.cell.geometry.clone(),
            forecast_time: cell.cell.forecast_time,
            risk_level: cell.risk_level,
            risk_score: cell.risk_score.unwrap_or(0.0),
            value: cell.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskMapPayload {
    pub risk_events: BTreeMap<String, Vec<RenderedCell>>,
    pub risk_summary: RiskSummary,
}

impl From<&WindRiskResult> for RiskMapPayload {
    fn from(result: &WindRiskResult) -> Self {
        let risk_events = result
            .risk_events
            .iter()
            .map(|(id, cells)| (id.clone(), cells.iter().map(RenderedCell::from).collect()))
            .collect();
        Self {
            risk_events,
            risk_summary: result.summary.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Collects view boxes; serialized as the list of boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundsAccumulator {
    boxes: Vec<LatLonBounds>,
}

impl BoundsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bounds: LatLonBounds) {
        self.boxes.push(bounds);
    }

    pub fn push_opt(&mut self, bounds: Option<LatLonBounds>) {
        if let Some(b) = bounds {
            self.push(b);
        }
    }

    pub fn boxes(&self) -> &[LatLonBounds] {
        &self.boxes
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Smallest box covering everything pushed so far.
    pub fn union(&self) -> Option<LatLonBounds> {
        self.boxes.iter().copied().reduce(|acc, b| acc.union(&b))
    }
}

impl Serialize for BoundsAccumulator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.boxes.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{at_hour, classified};

    fn bounds(s: f64, w: f64, n: f64, e: f64) -> LatLonBounds {
        LatLonBounds { south: s, west: w, north: n, east: e }
    }

    #[test]
    fn test_accumulator_unions_boxes() {
        let mut acc = BoundsAccumulator::new();
        assert!(acc.union().is_none());
        acc.push(bounds(40.0, -100.0, 41.0, -99.0));
        acc.push_opt(None);
        acc.push(bounds(39.5, -99.5, 40.5, -98.0));
        assert_eq!(acc.boxes().len(), 2);
        assert_eq!(acc.union(), Some(bounds(39.5, -100.0, 41.0, -98.0)));
        assert_eq!(
            serde_json::to_string(&acc).expect("bounds serialize"),
            "[[[40.0,-100.0],[41.0,-99.0]],[[39.5,-99.5],[40.5,-98.0]]]"
        );
    }

    #[test]
    fn test_rendered_cell_carries_geojson_geometry() {
        let mut cell = classified(-100.0, at_hour(12), 14.0, RiskLevel::Moderate);
        cell.risk_score = Some(25.0);
        let json: serde_json::Value = serde_json::to_value(RenderedCell::from(&cell)).unwrap();
        assert_eq!(json["geometry"]["type"], "Polygon");
        assert_eq!(json["risk_level"], "moderate");
        assert_eq!(json["risk_score"], 25.0);
    }
}
