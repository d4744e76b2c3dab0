//! Forecast row ingest.
//!
//! Rows arrive from the forecast source with the geometry as GeoJSON text
//! and the timestamp as text. Rows that fail to parse are skipped and
//! counted; the call only fails when nothing usable remains.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SubsecRound, Utc};
use geo::{BoundingRect, Intersects, MultiPolygon, Polygon};
use serde::Deserialize;

use crate::error::AnalysisError;
use crate::geometry::index::rects_overlap;
use crate::geometry::{self, EnvelopeIndex};
use crate::logging::{self, Diagnostic, Severity, Stage};
use crate::model::ForecastCell;

// ============================================================================
// Raw rows
// ============================================================================

/// One row as delivered by the forecast warehouse.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawForecastRow {
    /// Polygon as GeoJSON text.
    pub geography: Option<String>,
    pub forecast_time: Option<String>,
    /// m/s
    pub wind_speed: Option<f64>,
    /// Kelvin
    pub temperature: Option<f64>,
}

/// Parsed cells plus what had to be dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub cells: Vec<ForecastCell>,
    pub skipped_geometry: usize,
    pub skipped_time: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses forecast timestamps in the shapes the warehouse emits:
/// RFC 3339, `2024-05-01 12:00:00+00:00`, `2024-05-01 12:00:00 UTC`, naive
/// date-times (taken as UTC) and bare dates (midnight UTC).
/// Sub-second precision is truncated so identity is stable.
pub fn parse_forecast_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc).trunc_subsecs(0));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc).trunc_subsecs(0));
    }

    let naive_text = text.strip_suffix(" UTC").unwrap_or(text);
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_text, format) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc).trunc_subsecs(0));
        }
    }

    NaiveDate::parse_from_str(naive_text, "%Y-%m-%d")
        .ok()
        .map(|date| DateTime::from_naive_utc_and_offset(date.and_time(NaiveTime::default()), Utc))
}

/// Converts raw rows into cells.
///
/// Errors:
/// - `EmptyInput("weather")` when no rows were supplied
/// - `MissingField` when `geography` or `forecast_time` is absent from
///   every row
/// - `NoHazardData` when every row was skipped
pub fn parse_forecast_rows(rows: &[RawForecastRow]) -> Result<IngestReport, AnalysisError> {
    if rows.is_empty() {
        return Err(AnalysisError::EmptyInput("weather"));
    }

    let mut missing = Vec::new();
    if rows.iter().all(|r| r.geography.is_none()) {
        missing.push("geography".to_string());
    }
    if rows.iter().all(|r| r.forecast_time.is_none()) {
        missing.push("forecast_time".to_string());
    }
    if !missing.is_empty() {
        return Err(AnalysisError::MissingField(missing));
    }

    // Grid polygons repeat once per forecast step; parse each distinct text once.
    let mut parsed: HashMap<&str, Result<(Polygon<f64>, String), String>> = HashMap::new();
    let mut cells = Vec::with_capacity(rows.len());
    let mut skipped_geometry = 0;
    let mut skipped_time = 0;
    let mut first_geometry_error: Option<AnalysisError> = None;

    for (row_index, row) in rows.iter().enumerate() {
        let Some(text) = row.geography.as_deref() else {
            skipped_geometry += 1;
            continue;
        };
        let entry = parsed.entry(text).or_insert_with(|| {
            geometry::parse_polygon(text).map(|polygon| {
                let key = geometry::geometry_key(&polygon);
                (polygon, key)
            })
        });
        let (polygon, key) = match entry {
            Ok(ok) => ok,
            Err(reason) => {
                skipped_geometry += 1;
                let err = AnalysisError::GeometryParse {
                    row: row_index,
                    reason: reason.clone(),
                };
                tracing::debug!(stage = %Stage::Ingest, "{}", err);
                first_geometry_error.get_or_insert(err);
                continue;
            }
        };

        let Some(forecast_time) = row.forecast_time.as_deref().and_then(parse_forecast_time) else {
            skipped_time += 1;
            continue;
        };

        cells.push(ForecastCell::with_key(
            polygon.clone(),
            key.clone(),
            forecast_time,
            row.wind_speed,
            row.temperature,
        ));
    }

    let mut diagnostics = Vec::new();
    if skipped_geometry > 0 {
        let detail = first_geometry_error
            .map(|e| format!(" (first: {})", e))
            .unwrap_or_default();
        diagnostics.push(logging::record_note(
            Stage::Ingest,
            Severity::Warning,
            format!("Skipped {} rows with missing or invalid geometry{}", skipped_geometry, detail),
        ));
    }
    if skipped_time > 0 {
        diagnostics.push(logging::record_note(
            Stage::Ingest,
            Severity::Warning,
            format!("Skipped {} rows with unparseable forecast_time", skipped_time),
        ));
    }

    if cells.is_empty() {
        let message = if skipped_geometry == rows.len() {
            "No valid geometries found in weather data."
        } else {
            "No valid weather timestamps found after processing."
        };
        return Err(AnalysisError::NoHazardData(message.to_string()));
    }

    tracing::info!(
        stage = %Stage::Ingest,
        "Parsed {} forecast cells from {} rows",
        cells.len(),
        rows.len()
    );

    Ok(IngestReport {
        cells,
        skipped_geometry,
        skipped_time,
        diagnostics,
    })
}

// ============================================================================
// Time filters
// ============================================================================

/// Half-open window `[start, end)` of forecast days after an init date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: i64,
}

impl ForecastWindow {
    /// Window of `requested_days` starting at midnight UTC of `init_date`,
    /// clamped to `1..=max_days`. A clamp is reported as a diagnostic.
    pub fn from_init_date(
        init_date: NaiveDate,
        requested_days: i64,
        max_days: i64,
    ) -> (Self, Option<Diagnostic>) {
        let max_days = max_days.max(1);
        let days = requested_days.clamp(1, max_days);
        let diagnostic = (days != requested_days).then(|| {
            logging::record_note(
                Stage::Ingest,
                Severity::Info,
                format!(
                    "forecast_days {} is outside 1..={}; using {}",
                    requested_days, max_days, days
                ),
            )
        });

        let start = DateTime::from_naive_utc_and_offset(init_date.and_time(NaiveTime::default()), Utc);
        let window = Self {
            start,
            end: start + Duration::days(days),
            days,
        };
        (window, diagnostic)
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// How the temperature variant picks forecast steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    /// One exact forecast step.
    Timestamp(DateTime<Utc>),
    /// Every step on one UTC calendar day.
    Date(NaiveDate),
    /// Every step on the last calendar day present in the data.
    LatestDate,
    Window(ForecastWindow),
}

impl TimeFilter {
    /// Human-readable description used in "no data" messages.
    pub fn describe(&self) -> String {
        match self {
            TimeFilter::Timestamp(t) => format!("timestamp {}", t.format("%Y-%m-%d %H:%M UTC")),
            TimeFilter::Date(d) => format!("date {}", d.format("%Y-%m-%d")),
            TimeFilter::LatestDate => "latest available date".to_string(),
            TimeFilter::Window(w) => format!(
                "{} day(s) from {}",
                w.days,
                w.start.format("%Y-%m-%d")
            ),
        }
    }
}

pub fn filter_window(cells: Vec<ForecastCell>, window: &ForecastWindow) -> Vec<ForecastCell> {
    filter_time(cells, &TimeFilter::Window(*window))
}

/// Keeps the cells selected by `filter`; input order is preserved.
pub fn filter_time(cells: Vec<ForecastCell>, filter: &TimeFilter) -> Vec<ForecastCell> {
    let before = cells.len();
    let kept: Vec<ForecastCell> = match filter {
        TimeFilter::Timestamp(t) => cells.into_iter().filter(|c| c.forecast_time == *t).collect(),
        TimeFilter::Date(d) => cells
            .into_iter()
            .filter(|c| c.forecast_time.date_naive() == *d)
            .collect(),
        TimeFilter::LatestDate => {
            let latest = cells.iter().map(|c| c.forecast_time.date_naive()).max();
            match latest {
                Some(d) => cells
                    .into_iter()
                    .filter(|c| c.forecast_time.date_naive() == d)
                    .collect(),
                None => Vec::new(),
            }
        }
        TimeFilter::Window(w) => cells.into_iter().filter(|c| w.contains(c.forecast_time)).collect(),
    };
    logging::log_filter_summary(Stage::Ingest, "forecast cells by time", before, kept.len());
    kept
}

// ============================================================================
// Region filter
// ============================================================================

/// Keeps cells that intersect `region`: bounding boxes first, then the
/// exact predicate against the region polygons whose boxes overlap.
pub fn filter_by_region(cells: Vec<ForecastCell>, region: &MultiPolygon<f64>) -> Vec<ForecastCell> {
    let before = cells.len();
    let Some(region_rect) = region.bounding_rect() else {
        logging::log_filter_summary(Stage::Ingest, "forecast cells by region", before, 0);
        return Vec::new();
    };
    let parts = EnvelopeIndex::from_polygons(&region.0);

    let kept: Vec<ForecastCell> = cells
        .into_iter()
        .filter(|cell| {
            let Some(cell_rect) = cell.geometry.bounding_rect() else {
                return false;
            };
            if !rects_overlap(&cell_rect, &region_rect) {
                return false;
            }
            parts
                .candidates(&cell_rect)
                .into_iter()
                .any(|i| cell.geometry.intersects(&region.0[i]))
        })
        .collect();

    logging::log_filter_summary(Stage::Ingest, "forecast cells by region", before, kept.len());
    kept
}

// ============================================================================
// Tests
// ============================================================================
