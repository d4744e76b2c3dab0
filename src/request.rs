//! Analysis requests.
//!
//! Requests arrive as JSON objects tagged by `action`:
//!
//! ```json
//! {"action": "analyze_wind_risk", "region": "Iowa", "init_date": "2024-05-01",
//!  "forecast_days": 3, "analyze_power_lines": true}
//! ```
//!
//! `AnalysisRequest::plan` validates one against the engine configuration
//! and fills in defaults, producing an `AnalysisPlan` the service can run
//! without further checks.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::EngineConfig;
use crate::error::AnalysisError;
use crate::ingest::forecast::{ForecastWindow, TimeFilter, parse_forecast_time};
use crate::logging::Diagnostic;
use crate::model::{AssetLayer, RiskThresholds, TemperatureThreshold};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AnalysisRequest {
    AnalyzeWindRisk(WindRiskRequest),
    UnsafeTemperature(UnsafeTemperatureRequest),
    HighTemperatureRisk(HighTemperatureRequest),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WindRiskRequest {
    pub region: String,
    pub init_date: NaiveDate,
    pub forecast_days: Option<i64>,
    pub moderate_threshold: Option<f64>,
    pub high_threshold: Option<f64>,
    #[serde(default)]
    pub analyze_power_lines: bool,
}

/// Cold hazard for one forecast step or day, optionally against oil wells.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnsafeTemperatureRequest {
    pub region: String,
    pub init_date: NaiveDate,
    pub min_temp_f: Option<f64>,
    /// A single forecast step; wins over `forecast_date`.
    pub forecast_timestamp: Option<String>,
    pub forecast_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub show_oil_wells: bool,
}

/// Heat hazard over a forecast window, optionally against power lines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HighTemperatureRequest {
    pub region: String,
    pub init_date: NaiveDate,
    pub max_temp_f: Option<f64>,
    pub forecast_days: Option<i64>,
    #[serde(default = "default_true")]
    pub analyze_power_lines: bool,
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct WindPlan {
    pub region: String,
    pub init_date: NaiveDate,
    pub window: ForecastWindow,
    pub thresholds: RiskThresholds,
    pub analyze_impact: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperaturePlan {
    pub region: String,
    pub init_date: NaiveDate,
    pub threshold: TemperatureThreshold,
    pub time_filter: TimeFilter,
    pub layer: Option<AssetLayer>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisPlan {
    Wind(WindPlan),
    Temperature(TemperaturePlan),
}

/// A validated plan plus any adjustments made while validating.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRequest {
    pub plan: AnalysisPlan,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisRequest {
    pub fn from_json(text: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(text).map_err(|e| AnalysisError::InvalidRequest(e.to_string()))
    }

    pub fn region(&self) -> &str {
        match self {
            AnalysisRequest::AnalyzeWindRisk(r) => &r.region,
            AnalysisRequest::UnsafeTemperature(r) => &r.region,
            AnalysisRequest::HighTemperatureRisk(r) => &r.region,
        }
    }

    pub fn plan(&self, config: &EngineConfig) -> Result<PlannedRequest, AnalysisError> {
        if self.region().trim().is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "region is required for hazard analysis".to_string(),
            ));
        }

        let mut diagnostics = Vec::new();
        let plan = match self {
            AnalysisRequest::AnalyzeWindRisk(r) => {
                let thresholds = RiskThresholds::new(
                    r.moderate_threshold.unwrap_or(config.wind.moderate_threshold_ms),
                    r.high_threshold.unwrap_or(config.wind.high_threshold_ms),
                )?;
                let (window, clamp) = ForecastWindow::from_init_date(
                    r.init_date,
                    r.forecast_days.unwrap_or(config.wind.forecast_days),
                    config.wind.max_forecast_days,
                );
                diagnostics.extend(clamp);
                AnalysisPlan::Wind(WindPlan {
                    region: r.region.clone(),
                    init_date: r.init_date,
                    window,
                    thresholds,
                    analyze_impact: r.analyze_power_lines,
                })
            }
            AnalysisRequest::UnsafeTemperature(r) => {
                let min_temp_f = finite_threshold(r.min_temp_f.unwrap_or(config.temperature.min_temp_f))?;
                let time_filter = match (&r.forecast_timestamp, r.forecast_date) {
                    (Some(text), _) => TimeFilter::Timestamp(parse_forecast_time(text).ok_or_else(|| {
                        AnalysisError::InvalidRequest(format!("unparseable forecast_timestamp '{}'", text))
                    })?),
                    (None, Some(date)) => TimeFilter::Date(date),
                    (None, None) => TimeFilter::LatestDate,
                };
                AnalysisPlan::Temperature(TemperaturePlan {
                    region: r.region.clone(),
                    init_date: r.init_date,
                    threshold: TemperatureThreshold::Below { min_temp_f },
                    time_filter,
                    layer: r.show_oil_wells.then_some(AssetLayer::OilWells),
                })
            }
            AnalysisRequest::HighTemperatureRisk(r) => {
                let max_temp_f = finite_threshold(r.max_temp_f.unwrap_or(config.temperature.max_temp_f))?;
                let (window, clamp) = ForecastWindow::from_init_date(
                    r.init_date,
                    r.forecast_days.unwrap_or(config.wind.forecast_days),
                    config.wind.max_forecast_days,
                );
                diagnostics.extend(clamp);
                AnalysisPlan::Temperature(TemperaturePlan {
                    region: r.region.clone(),
                    init_date: r.init_date,
                    threshold: TemperatureThreshold::Above { max_temp_f },
                    time_filter: TimeFilter::Window(window),
                    layer: r.analyze_power_lines.then_some(AssetLayer::PowerInfrastructure),
                })
            }
        };

        Ok(PlannedRequest { plan, diagnostics })
    }
}

fn finite_threshold(value: f64) -> Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::InvalidRequest(format!(
            "temperature threshold must be finite, got {}",
            value
        )))
    }
}
