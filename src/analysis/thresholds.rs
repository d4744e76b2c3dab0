//! Threshold classification.

use crate::error::AnalysisError;
use crate::logging::{self, Diagnostic, Severity, Stage};
use crate::model::{ClassifiedCell, ForecastCell, RiskLevel, RiskThresholds, TemperatureThreshold};

/// Cells that crossed a threshold, plus what was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub cells: Vec<ClassifiedCell>,
    /// Cells lacking the classified field (or carrying a non-finite value).
    pub skipped_missing_value: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Severity of a single wind speed, `None` below the moderate cutoff.
pub fn wind_level(speed: f64, thresholds: &RiskThresholds) -> Option<RiskLevel> {
    if speed >= thresholds.high {
        Some(RiskLevel::High)
    } else if speed >= thresholds.moderate {
        Some(RiskLevel::Moderate)
    } else {
        None
    }
}

/// Keeps cells with `wind_speed >= moderate`, labeled High when
/// `wind_speed >= high`. Input order is preserved.
pub fn classify_wind(
    cells: &[ForecastCell],
    thresholds: &RiskThresholds,
) -> Result<Classification, AnalysisError> {
    classify_by(cells, "wind_speed", |c| c.wind_speed, |speed| {
        wind_level(speed, thresholds)
    })
}

/// Keeps cells whose temperature, converted to °F, is at or past the
/// threshold. Classified values are in °F.
pub fn classify_temperature(
    cells: &[ForecastCell],
    threshold: &TemperatureThreshold,
) -> Result<Classification, AnalysisError> {
    classify_by(cells, "temperature", |c| c.temperature_f(), |temp_f| {
        threshold.is_unsafe(temp_f).then_some(RiskLevel::Unsafe)
    })
}

fn classify_by(
    cells: &[ForecastCell],
    field: &str,
    value_of: impl Fn(&ForecastCell) -> Option<f64>,
    level_of: impl Fn(f64) -> Option<RiskLevel>,
) -> Result<Classification, AnalysisError> {
    if cells.is_empty() {
        return Err(AnalysisError::EmptyInput("weather"));
    }

    let mut classified = Vec::new();
    let mut skipped = 0;
    for cell in cells {
        match value_of(cell).filter(|v| v.is_finite()) {
            Some(value) => {
                if let Some(level) = level_of(value) {
                    classified.push(ClassifiedCell::new(cell.clone(), level, value));
                }
            }
            None => skipped += 1,
        }
    }

    if skipped == cells.len() {
        return Err(AnalysisError::MissingField(vec![field.to_string()]));
    }

    let mut diagnostics = Vec::new();
    if skipped > 0 {
        diagnostics.push(logging::record_note(
            Stage::Classification,
            Severity::Warning,
            format!("Skipped {} cells without a {} value", skipped, field),
        ));
    }
    tracing::info!(
        stage = %Stage::Classification,
        "{} of {} cells crossed the {} threshold",
        classified.len(),
        cells.len(),
        field
    );

    Ok(Classification {
        cells: classified,
        skipped_missing_value: skipped,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{at_hour, kelvin_for, temp_cell, wind_cell};
    use crate::model::ForecastCell;

    fn thresholds() -> RiskThresholds {
        RiskThresholds::new(13.0, 16.0).unwrap()
    }

    // --- Wind ---------------------------------------------------------------

    #[test]
    fn test_values_below_moderate_are_dropped() {
        let cells: Vec<ForecastCell> = [10.0, 14.0, 17.0]
            .iter()
            .enumerate()
            .map(|(i, &s)| wind_cell(-100.0 + i as f64, 40.0, at_hour(12), s))
            .collect();
        let result = classify_wind(&cells, &thresholds()).expect("cells have wind speed");
        let values: Vec<f64> = result.cells.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![14.0, 17.0]);
        assert_eq!(result.cells[0].risk_level, RiskLevel::Moderate);
        assert_eq!(result.cells[1].risk_level, RiskLevel::High);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert_eq!(wind_level(13.0, &thresholds()), Some(RiskLevel::Moderate));
        assert_eq!(wind_level(15.999, &thresholds()), Some(RiskLevel::Moderate));
        assert_eq!(wind_level(16.0, &thresholds()), Some(RiskLevel::High));
        assert_eq!(wind_level(12.999, &thresholds()), None);
    }

    #[test]
    fn test_every_output_cell_meets_moderate() {
        let cells: Vec<ForecastCell> = (0..40)
            .map(|i| wind_cell(-100.0, 40.0, at_hour(i % 24), i as f64 * 0.5))
            .collect();
        let t = thresholds();
        let result = classify_wind(&cells, &t).unwrap();
        assert!(result.cells.len() <= cells.len());
        for c in &result.cells {
            assert!(c.value >= t.moderate);
            assert_eq!(c.risk_level == RiskLevel::High, c.value >= t.high);
        }
    }

    // --- Missing data -------------------------------------------------------

    #[test]
    fn test_empty_input_is_reported() {
        let err = classify_wind(&[], &thresholds()).unwrap_err();
        assert_eq!(err.to_string(), "Input weather data is empty.");
    }

    #[test]
    fn test_field_missing_everywhere_is_missing_field() {
        let cells = vec![temp_cell(-100.0, 40.0, at_hour(0), 280.0)];
        let err = classify_wind(&cells, &thresholds()).unwrap_err();
        assert_eq!(err, AnalysisError::MissingField(vec!["wind_speed".to_string()]));
        assert!(err.to_string().contains("wind_speed"));
    }

    #[test]
    fn test_cells_missing_the_field_are_skipped_and_counted() {
        let cells = vec![
            wind_cell(-100.0, 40.0, at_hour(0), 20.0),
            temp_cell(-99.0, 40.0, at_hour(0), 280.0),
            wind_cell(-98.0, 40.0, at_hour(0), f64::NAN),
        ];
        let result = classify_wind(&cells, &thresholds()).unwrap();
        assert_eq!(result.cells.len(), 1);
        assert_eq!(result.skipped_missing_value, 2);
        assert_eq!(result.diagnostics.len(), 1);
    }

    // --- Temperature --------------------------------------------------------

    #[test]
    fn test_cold_threshold_converts_kelvin() {
        let cells: Vec<ForecastCell> = [15.0, 25.0, 18.0]
            .iter()
            .enumerate()
            .map(|(i, &f)| temp_cell(-100.0 + i as f64, 47.0, at_hour(6), kelvin_for(f)))
            .collect();
        let result = classify_temperature(&cells, &TemperatureThreshold::Below { min_temp_f: 20.0 })
            .expect("cells have temperature");
        assert_eq!(result.cells.len(), 2);
        assert!((result.cells[0].value - 15.0).abs() < 1e-9);
        assert!((result.cells[1].value - 18.0).abs() < 1e-9);
        assert!(result.cells.iter().all(|c| c.risk_level == RiskLevel::Unsafe));
    }

    #[test]
    fn test_heat_threshold_keeps_hot_cells() {
        let cells = vec![
            temp_cell(-100.0, 31.0, at_hour(18), kelvin_for(99.0)),
            temp_cell(-99.0, 31.0, at_hour(18), kelvin_for(90.0)),
        ];
        let result = classify_temperature(&cells, &TemperatureThreshold::Above { max_temp_f: 95.0 }).unwrap();
        assert_eq!(result.cells.len(), 1);
        assert!((result.cells[0].value - 99.0).abs() < 1e-9);
    }
}
