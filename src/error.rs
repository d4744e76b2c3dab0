//! Error taxonomy for the hazard engine.
//!
//! Every variant is recoverable. Stages convert these into `Diagnostic`s
//! (see `logging`) and degrade to the next-best analysis mode instead of
//! propagating them to the caller.

use thiserror::Error;

/// Errors that can arise while ingesting, classifying or joining hazard data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// No cells or assets were supplied. The payload names the data kind,
    /// e.g. `"weather"` renders as "Input weather data is empty."
    #[error("Input {0} data is empty.")]
    EmptyInput(&'static str),

    /// A required field is absent from every row of the input.
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingField(Vec<String>),

    /// A cell or asset geometry failed to parse or validate.
    #[error("Invalid geometry in row {row}: {reason}")]
    GeometryParse { row: usize, reason: String },

    /// A coordinate could not be moved into or out of the metric CRS.
    #[error("Reprojection failed: {0}")]
    Reprojection(String),

    #[error("Buffering failed: {0}")]
    Buffer(String),

    #[error("Spatial join failed: {0}")]
    SpatialJoin(String),

    #[error("Could not find region: {0}. Please specify a valid state or county name.")]
    RegionNotFound(String),

    /// Hazard data exists upstream but nothing usable remains for the
    /// selected region / time window / threshold.
    #[error("{0}")]
    NoHazardData(String),

    #[error("{0}")]
    AssetLayerUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_message_matches_user_facing_text() {
        let err = AnalysisError::EmptyInput("weather");
        assert_eq!(err.to_string(), "Input weather data is empty.");
    }

    #[test]
    fn test_missing_field_lists_every_field() {
        let err = AnalysisError::MissingField(vec!["wind_speed".into(), "forecast_time".into()]);
        assert_eq!(err.to_string(), "Missing required fields: wind_speed, forecast_time");
    }

    #[test]
    fn test_region_not_found_names_the_region() {
        let err = AnalysisError::RegionNotFound("Atlantis".into());
        assert!(err.to_string().contains("Atlantis"));
    }
}
