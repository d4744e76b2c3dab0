//! Summary aggregation.

use std::cmp::Ordering;

use crate::analysis::impact::ImpactOutcome;
use crate::logging::{Diagnostic, Stage};
use crate::model::{AnalysisType, AssetLayer, RiskEvent, RiskSummary};

/// What was computed and how to describe it.
///
/// `AssetImpact` only when impact analysis was requested and the join
/// produced rows; otherwise `General`, with a description naming why
/// asset-level detail is missing.
pub fn describe_analysis(requested: bool, outcome: &ImpactOutcome, layer: AssetLayer) -> (AnalysisType, String) {
    let label = layer.label();
    let general = "general wind risk areas";
    if !requested {
        return (AnalysisType::General, general.to_string());
    }
    match outcome {
        ImpactOutcome::Intersected { .. } => (
            AnalysisType::AssetImpact,
            format!("potential {} impacts", label),
        ),
        ImpactOutcome::NoAssetData => (
            AnalysisType::General,
            format!("{} ({} data unavailable for intersection)", general, label),
        ),
        ImpactOutcome::NoIntersection => (
            AnalysisType::General,
            format!("{} (none intersected {}s)", general, label),
        ),
        ImpactOutcome::BufferFailed(_) => (
            AnalysisType::General,
            format!("{} ({} buffering failed)", general, label),
        ),
        ImpactOutcome::JoinFailed(_) => (
            AnalysisType::General,
            format!("{} ({} intersection failed)", general, label),
        ),
        ImpactOutcome::NotRequested => (AnalysisType::General, general.to_string()),
    }
}

/// The event with the most High cells, then the highest value. Exact ties
/// go to the earliest event.
pub fn highest_risk_event(events: &[RiskEvent]) -> Option<&RiskEvent> {
    events.iter().fold(None, |best: Option<&RiskEvent>, event| match best {
        None => Some(event),
        Some(current) => {
            let ordering = event
                .high_count
                .cmp(&current.high_count)
                .then_with(|| event.max_value.total_cmp(&current.max_value));
            if ordering == Ordering::Greater {
                Some(event)
            } else {
                Some(current)
            }
        }
    })
}

/// Rolls events into a summary. An empty event list yields a not-found
/// summary carrying `not_found_message`.
pub fn summarize(
    events: Vec<RiskEvent>,
    requested: bool,
    outcome: &ImpactOutcome,
    layer: AssetLayer,
    not_found_message: &str,
    diagnostics: Vec<Diagnostic>,
) -> RiskSummary {
    if events.is_empty() {
        return RiskSummary::not_found(not_found_message, diagnostics);
    }

    let (analysis_type, description) = describe_analysis(requested, outcome, layer);
    let high_risk_areas = events.iter().map(|e| e.high_count).sum();
    let moderate_risk_areas = events.iter().map(|e| e.moderate_count).sum();
    let affected_estimate_km = events.iter().filter_map(|e| e.affected_estimate_km).sum();
    let max_value = events.iter().map(|e| e.max_value).reduce(f64::max);
    let highest_risk_timestamp = highest_risk_event(&events).map(|e| e.timestamp.clone());

    let message = format!("Found {} timestamps with {}.", events.len(), description);
    tracing::info!(stage = %Stage::Summary, "{}", message);

    RiskSummary {
        risk_found: true,
        message,
        event_count: events.len(),
        events,
        high_risk_areas,
        moderate_risk_areas,
        affected_estimate_km,
        analysis_type,
        highest_risk_timestamp,
        max_value,
        diagnostics,
    }
}
