//! Structured logging for the hazard engine
//!
//! Wraps `tracing` with stage-aware helpers. Every degradation the engine
//! recovers from is both logged and returned as a `Diagnostic`, so the
//! caller can explain why a result is partial without scraping logs.

use std::fmt;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    RegionResolution,
    Classification,
    AssetImpact,
    Scoring,
    EventGrouping,
    Summary,
    ZoneExtraction,
    AssetLayer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::RegionResolution => write!(f, "REGION"),
            Stage::Classification => write!(f, "CLASSIFY"),
            Stage::AssetImpact => write!(f, "IMPACT"),
            Stage::Scoring => write!(f, "SCORE"),
            Stage::EventGrouping => write!(f, "EVENTS"),
            Stage::Summary => write!(f, "SUMMARY"),
            Stage::ZoneExtraction => write!(f, "ZONES"),
            Stage::AssetLayer => write!(f, "ASSETS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Normal "nothing to report" outcome: empty windows, unknown regions,
    /// layers that only exist for some states.
    Expected,
    /// Some input was dropped but the analysis carried on.
    Degraded,
    /// A geometry operation broke; asset-level detail is lost for this call.
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Degraded => write!(f, "DEGRADED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

pub fn classify_failure(err: &AnalysisError) -> FailureType {
    match err {
        AnalysisError::EmptyInput(_)
        | AnalysisError::NoHazardData(_)
        | AnalysisError::RegionNotFound(_)
        | AnalysisError::AssetLayerUnavailable(_) => FailureType::Expected,
        AnalysisError::MissingField(_)
        | AnalysisError::GeometryParse { .. }
        | AnalysisError::InvalidRequest(_) => FailureType::Degraded,
        AnalysisError::Reprojection(_)
        | AnalysisError::Buffer(_)
        | AnalysisError::SpatialJoin(_)
        | AnalysisError::Config(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A recorded degradation, attached to summaries for the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub severity: Severity,
    pub message: String,
}

/// Logs a stage failure with automatic classification and returns the
/// matching diagnostic.
pub fn record_failure(stage: Stage, operation: &str, err: &AnalysisError) -> Diagnostic {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    let severity = match failure_type {
        FailureType::Expected => {
            tracing::info!(stage = %stage, "{}", message);
            Severity::Info
        }
        FailureType::Degraded => {
            tracing::warn!(stage = %stage, "{}", message);
            Severity::Warning
        }
        FailureType::Unexpected => {
            tracing::error!(stage = %stage, "{}", message);
            Severity::Error
        }
    };

    Diagnostic {
        stage,
        severity,
        message,
    }
}

/// Logs a free-form note (skipped rows, fallbacks) and returns it as a
/// diagnostic.
pub fn record_note(stage: Stage, severity: Severity, message: impl Into<String>) -> Diagnostic {
    let message = message.into();
    match severity {
        Severity::Info => tracing::info!(stage = %stage, "{}", message),
        Severity::Warning => tracing::warn!(stage = %stage, "{}", message),
        Severity::Error => tracing::error!(stage = %stage, "{}", message),
    }
    Diagnostic {
        stage,
        severity,
        message,
    }
}

/// Logs how many rows a filtering step kept.
pub fn log_filter_summary(stage: Stage, what: &str, before: usize, after: usize) {
    let message = format!("Filtered {} from {} to {}", what, before, after);
    if after == 0 && before > 0 {
        tracing::warn!(stage = %stage, "{}", message);
    } else {
        tracing::debug!(stage = %stage, "{}", message);
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Installs the global `tracing` subscriber.
///
/// `filter` uses `EnvFilter` syntax (e.g. `hazard_engine=debug`). Returns an
/// error if the filter is malformed or a subscriber is already installed.
pub fn init_logging(filter: &str, json: bool) -> Result<(), AnalysisError> {
    let env_filter = EnvFilter::try_new(filter)
        .map_err(|e| AnalysisError::Config(format!("invalid log filter '{}': {}", filter, e)))?;

    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
    };

    result.map_err(|e| AnalysisError::Config(format!("failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            classify_failure(&AnalysisError::EmptyInput("weather")),
            FailureType::Expected
        );
        assert_eq!(
            classify_failure(&AnalysisError::GeometryParse { row: 3, reason: "x".into() }),
            FailureType::Degraded
        );
        assert_eq!(
            classify_failure(&AnalysisError::SpatialJoin("boom".into())),
            FailureType::Unexpected
        );
    }

    #[test]
    fn test_record_failure_maps_classification_to_severity() {
        let diag = record_failure(
            Stage::AssetImpact,
            "Buffering assets",
            &AnalysisError::Buffer("radius must be positive".into()),
        );
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.stage, Stage::AssetImpact);
        assert!(diag.message.starts_with("Buffering assets failed [UNEXPECTED]"));
    }

    #[test]
    fn test_malformed_filter_is_a_config_error() {
        let result = init_logging("hazard_engine=notalevel[", false);
        assert!(matches!(result, Err(AnalysisError::Config(_))));
    }
}
