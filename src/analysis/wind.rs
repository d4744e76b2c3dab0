//! Wind risk pipeline: classify → asset impact → score → group → summarize.

use std::collections::BTreeMap;

use crate::analysis::events::group_events;
use crate::analysis::impact::{AssetImpactAnalyzer, ImpactOutcome};
use crate::analysis::scoring::score_cells;
use crate::analysis::summary::summarize;
use crate::analysis::thresholds::classify_wind;
use crate::config::AssetConfig;
use crate::geometry::GeometryProvider;
use crate::logging::{self, Stage};
use crate::model::{AssetLayer, AssetPoint, ClassifiedCell, ForecastCell, RiskSummary, RiskThresholds};

/// Scored cells per event id, plus the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct WindRiskResult {
    pub risk_events: BTreeMap<String, Vec<ClassifiedCell>>,
    pub summary: RiskSummary,
    pub impact: ImpactOutcome,
}

pub struct WindRiskAnalyzer<'a> {
    thresholds: RiskThresholds,
    impact: AssetImpactAnalyzer<'a>,
    layer: AssetLayer,
    km_per_cell: f64,
}

impl<'a> WindRiskAnalyzer<'a> {
    pub fn new(thresholds: RiskThresholds, provider: &'a dyn GeometryProvider, assets: &AssetConfig) -> Self {
        Self {
            thresholds,
            impact: AssetImpactAnalyzer::new(provider, assets.impact_buffer_m),
            layer: AssetLayer::PowerInfrastructure,
            km_per_cell: assets.affected_km_per_cell,
        }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    /// Runs the whole pipeline. Never fails: every problem ends up in the
    /// summary message and diagnostics.
    pub fn analyze(
        &self,
        cells: &[ForecastCell],
        assets: Option<&[AssetPoint]>,
        analyze_impact: bool,
    ) -> WindRiskResult {
        let not_found = format!(
            "No areas with wind speeds over {} m/s found in the analyzed forecast period.",
            self.thresholds.moderate
        );

        let classification = match classify_wind(cells, &self.thresholds) {
            Ok(c) => c,
            Err(e) => {
                let diag = logging::record_failure(Stage::Classification, "Classifying wind cells", &e);
                return WindRiskResult {
                    risk_events: BTreeMap::new(),
                    summary: RiskSummary::not_found(e.to_string(), vec![diag]),
                    impact: ImpactOutcome::NotRequested,
                };
            }
        };
        let mut diagnostics = classification.diagnostics;

        if classification.cells.is_empty() {
            tracing::info!(stage = %Stage::Classification, "{}", not_found);
            return WindRiskResult {
                risk_events: BTreeMap::new(),
                summary: RiskSummary::not_found(not_found, diagnostics),
                impact: ImpactOutcome::NotRequested,
            };
        }

        let impact = self.impact.analyze(classification.cells, assets, analyze_impact);
        diagnostics.extend(impact.diagnostics);

        let scored = score_cells(impact.cells, self.thresholds.moderate);
        let events = group_events(scored, impact.outcome.intersection_performed(), self.km_per_cell);
        let summary = summarize(
            events.events,
            analyze_impact,
            &impact.outcome,
            self.layer,
            &not_found,
            diagnostics,
        );

        WindRiskResult {
            risk_events: events.cells_by_event,
            summary,
            impact: impact.outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{at_hour, temp_cell, wind_cell};
    use crate::geometry::WebMercator;
    use crate::model::AnalysisType;

    fn analyzer(provider: &WebMercator) -> WindRiskAnalyzer<'_> {
        WindRiskAnalyzer::new(
            RiskThresholds::new(13.0, 16.0).unwrap(),
            provider,
            &AssetConfig::default(),
        )
    }

    #[test]
    fn test_one_timestamp_gives_one_event() {
        let provider = WebMercator::default();
        let cells = vec![
            wind_cell(-100.0, 40.0, at_hour(12), 10.0),
            wind_cell(-99.0, 40.0, at_hour(12), 14.0),
            wind_cell(-98.0, 40.0, at_hour(12), 17.0),
        ];
        let result = analyzer(&provider).analyze(&cells, None, false);

        assert_eq!(result.summary.event_count, 1);
        let scored = &result.risk_events["wind_event_20240501_1200"];
        let scores: Vec<f64> = scored.iter().map(|c| c.risk_score.unwrap()).collect();
        assert_eq!(scores, vec![25.0, 100.0]);
        assert_eq!(result.summary.message, "Found 1 timestamps with general wind risk areas.");
        assert_eq!(result.summary.analysis_type, AnalysisType::General);
    }

    #[test]
    fn test_calm_forecast_reports_threshold() {
        let provider = WebMercator::default();
        let cells = vec![wind_cell(-100.0, 40.0, at_hour(12), 5.0)];
        let result = analyzer(&provider).analyze(&cells, None, false);
        assert!(!result.summary.risk_found);
        assert_eq!(
            result.summary.message,
            "No areas with wind speeds over 13 m/s found in the analyzed forecast period."
        );
    }

    #[test]
    fn test_missing_wind_field_is_reported_not_thrown() {
        let provider = WebMercator::default();
        let cells = vec![temp_cell(-100.0, 40.0, at_hour(12), 280.0)];
        let result = analyzer(&provider).analyze(&cells, None, false);
        assert!(!result.summary.risk_found);
        assert!(result.summary.message.contains("wind_speed"));
        assert_eq!(result.summary.diagnostics.len(), 1);
    }

    #[test]
    fn test_requested_without_assets_stays_general() {
        let provider = WebMercator::default();
        let cells = vec![wind_cell(-100.0, 40.0, at_hour(12), 17.0)];
        let result = analyzer(&provider).analyze(&cells, None, true);
        assert_eq!(result.summary.analysis_type, AnalysisType::General);
        assert!(result.summary.message.contains("power line data unavailable"));
        assert_eq!(result.summary.affected_estimate_km, 0.0);
        assert_eq!(result.impact, ImpactOutcome::NoAssetData);
    }
}
