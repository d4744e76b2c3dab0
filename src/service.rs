//! Request orchestration.
//!
//! `HazardService` takes a validated request through region resolution,
//! forecast ingest and the wind or temperature pipeline. It never returns
//! an error: anything that stops an analysis becomes
//! `AnalysisOutcome::Unavailable` with the user-facing message and the
//! diagnostics gathered so far.

use chrono::NaiveDate;
use serde::Serialize;

use crate::analysis::impact::ImpactOutcome;
use crate::analysis::wind::{WindRiskAnalyzer, WindRiskResult};
use crate::analysis::zones::{HazardZoneExtractor, ZoneExtraction, ZoneQuery};
use crate::cache::ZoneAssetCache;
use crate::config::EngineConfig;
use crate::error::AnalysisError;
use crate::geometry::GeometryProvider;
use crate::ingest::assets::{parse_asset_rows, prefilter_assets_to_region};
use crate::ingest::forecast::{filter_by_region, filter_window, parse_forecast_rows};
use crate::logging::{self, Diagnostic, Stage};
use crate::model::{AssetLayer, AssetPoint, ForecastCell, RiskSummary};
use crate::regions::{Region, RegionResolver};
use crate::render::{BoundsAccumulator, RiskMapPayload};
use crate::request::{AnalysisPlan, AnalysisRequest, TemperaturePlan, WindPlan};
use crate::sources::{AssetSource, ForecastSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Wind { payload: RiskMapPayload },
    Temperature { extraction: ZoneExtraction },
    Unavailable { message: String, diagnostics: Vec<Diagnostic> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResponse {
    pub outcome: AnalysisOutcome,
    /// Boxes the map should fit: the region, then any zones.
    pub bounds: BoundsAccumulator,
}

impl ServiceResponse {
    fn unavailable(message: impl Into<String>, diagnostics: Vec<Diagnostic>, bounds: BoundsAccumulator) -> Self {
        Self {
            outcome: AnalysisOutcome::Unavailable {
                message: message.into(),
                diagnostics,
            },
            bounds,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Unavailable { .. })
    }
}

pub struct HazardService<'a> {
    config: EngineConfig,
    forecasts: &'a dyn ForecastSource,
    regions: &'a dyn RegionResolver,
    assets: &'a dyn AssetSource,
    provider: &'a dyn GeometryProvider,
}

impl<'a> HazardService<'a> {
    pub fn new(
        config: EngineConfig,
        forecasts: &'a dyn ForecastSource,
        regions: &'a dyn RegionResolver,
        assets: &'a dyn AssetSource,
        provider: &'a dyn GeometryProvider,
    ) -> Self {
        Self {
            config,
            forecasts,
            regions,
            assets,
            provider,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parses and runs a JSON request.
    pub fn handle_json(&self, text: &str, cache: &mut ZoneAssetCache) -> ServiceResponse {
        match AnalysisRequest::from_json(text) {
            Ok(request) => self.handle(&request, cache),
            Err(e) => {
                let diag = logging::record_failure(Stage::Ingest, "Parsing request", &e);
                ServiceResponse::unavailable(e.to_string(), vec![diag], BoundsAccumulator::new())
            }
        }
    }

    pub fn handle(&self, request: &AnalysisRequest, cache: &mut ZoneAssetCache) -> ServiceResponse {
        let planned = match request.plan(&self.config) {
            Ok(p) => p,
            Err(e) => {
                let diag = logging::record_failure(Stage::Ingest, "Validating request", &e);
                return ServiceResponse::unavailable(e.to_string(), vec![diag], BoundsAccumulator::new());
            }
        };

        match planned.plan {
            AnalysisPlan::Wind(plan) => self.run_wind(&plan, planned.diagnostics),
            AnalysisPlan::Temperature(plan) => self.run_temperature(&plan, planned.diagnostics, cache),
        }
    }

    // ---------------------------------------------------------------------------
    // Wind
    // ---------------------------------------------------------------------------

    fn run_wind(&self, plan: &WindPlan, mut diagnostics: Vec<Diagnostic>) -> ServiceResponse {
        let mut bounds = BoundsAccumulator::new();
        let region = match self.resolve(&plan.region, &mut diagnostics) {
            Ok(r) => r,
            Err(e) => return ServiceResponse::unavailable(e.to_string(), diagnostics, bounds),
        };
        bounds.push_opt(region.bounds());

        let cells = match self.load_cells(plan.init_date, &mut diagnostics) {
            Ok(cells) => cells,
            Err(e) => return Self::wind_not_found(e.to_string(), diagnostics, bounds),
        };

        let before = cells.len();
        let cells = filter_window(cells, &plan.window);
        logging::log_filter_summary(Stage::Ingest, "forecast cells to window", before, cells.len());
        let before = cells.len();
        let cells = filter_by_region(cells, &region.geometry);
        logging::log_filter_summary(Stage::Ingest, "forecast cells to region", before, cells.len());
        if cells.is_empty() {
            let message = format!("No weather data points found within {}.", region.display_name());
            return Self::wind_not_found(message, diagnostics, bounds);
        }

        let assets = if plan.analyze_impact {
            self.load_power_assets(&region, &mut diagnostics)
        } else {
            None
        };

        let analyzer = WindRiskAnalyzer::new(plan.thresholds, self.provider, &self.config.assets);
        let mut result = analyzer.analyze(&cells, assets.as_deref(), plan.analyze_impact);
        diagnostics.append(&mut result.summary.diagnostics);
        result.summary.diagnostics = diagnostics;

        ServiceResponse {
            outcome: AnalysisOutcome::Wind {
                payload: RiskMapPayload::from(&result),
            },
            bounds,
        }
    }

    fn wind_not_found(message: String, diagnostics: Vec<Diagnostic>, bounds: BoundsAccumulator) -> ServiceResponse {
        let result = WindRiskResult {
            risk_events: Default::default(),
            summary: RiskSummary::not_found(message, diagnostics),
            impact: ImpactOutcome::NotRequested,
        };
        ServiceResponse {
            outcome: AnalysisOutcome::Wind {
                payload: RiskMapPayload::from(&result),
            },
            bounds,
        }
    }

    /// Power assets near `region`, or `None` when the layer cannot be used.
    fn load_power_assets(&self, region: &Region, diagnostics: &mut Vec<Diagnostic>) -> Option<Vec<AssetPoint>> {
        let layer = AssetLayer::PowerInfrastructure;
        let loaded = self
            .assets
            .load_assets(layer)
            .and_then(|rows| parse_asset_rows(&rows));
        let report = match loaded {
            Ok(report) => report,
            Err(e) => {
                diagnostics.push(logging::record_failure(Stage::AssetLayer, "Loading power lines", &e));
                return None;
            }
        };
        diagnostics.extend(report.diagnostics);

        match prefilter_assets_to_region(
            report.assets,
            &region.geometry,
            self.config.assets.region_prefilter_buffer_m,
            self.provider,
        ) {
            Ok(kept) if kept.is_empty() => {
                tracing::info!(stage = %Stage::AssetLayer, "No power lines found within buffered {}", region.name);
                None
            }
            Ok(kept) => Some(kept),
            Err(e) => {
                diagnostics.push(logging::record_failure(
                    Stage::AssetLayer,
                    "Pre-filtering power lines to region",
                    &e,
                ));
                None
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Temperature
    // ---------------------------------------------------------------------------

    fn run_temperature(
        &self,
        plan: &TemperaturePlan,
        mut diagnostics: Vec<Diagnostic>,
        cache: &mut ZoneAssetCache,
    ) -> ServiceResponse {
        let mut bounds = BoundsAccumulator::new();
        let region = match self.resolve(&plan.region, &mut diagnostics) {
            Ok(r) => r,
            Err(e) => return ServiceResponse::unavailable(e.to_string(), diagnostics, bounds),
        };
        bounds.push_opt(region.bounds());

        let cells = match self.load_cells(plan.init_date, &mut diagnostics) {
            Ok(cells) => cells,
            Err(e) => return ServiceResponse::unavailable(e.to_string(), diagnostics, bounds),
        };

        let extractor = HazardZoneExtractor::new(
            self.assets,
            self.provider,
            self.config.sampling.clone(),
        );
        let query = ZoneQuery {
            region: &region,
            init_date: plan.init_date,
            threshold: plan.threshold,
            time_filter: plan.time_filter,
            layer: plan.layer,
        };

        match extractor.extract(cells, &query, Some(cache)) {
            Ok(mut extraction) => {
                bounds.push(extraction.zones.total_bounds);
                diagnostics.append(&mut extraction.diagnostics);
                extraction.diagnostics = diagnostics;
                ServiceResponse {
                    outcome: AnalysisOutcome::Temperature { extraction },
                    bounds,
                }
            }
            Err(e) => {
                diagnostics.push(logging::record_failure(Stage::ZoneExtraction, "Extracting hazard zones", &e));
                ServiceResponse::unavailable(e.to_string(), diagnostics, bounds)
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Shared steps
    // ---------------------------------------------------------------------------

    fn resolve(&self, name: &str, diagnostics: &mut Vec<Diagnostic>) -> Result<Region, AnalysisError> {
        self.regions.resolve(name).inspect_err(|e| {
            diagnostics.push(logging::record_failure(Stage::RegionResolution, "Resolving region", e));
        })
    }

    fn load_cells(
        &self,
        init_date: NaiveDate,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<ForecastCell>, AnalysisError> {
        let ingested = self
            .forecasts
            .fetch_rows(init_date)
            .and_then(|rows| parse_forecast_rows(&rows));
        match ingested {
            Ok(report) => {
                tracing::info!(
                    stage = %Stage::Ingest,
                    "Loaded {} forecast cells for run {}",
                    report.cells.len(),
                    init_date
                );
                diagnostics.extend(report.diagnostics);
                Ok(report.cells)
            }
            Err(e) => {
                diagnostics.push(logging::record_failure(Stage::Ingest, "Loading forecast rows", &e));
                Err(e)
            }
        }
    }
}
