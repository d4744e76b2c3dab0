//! Risk score normalization.
//!
//! Scores are relative to the set being scored: the strongest cell in one
//! analysis call is always 100, a cell exactly at the threshold is always 0.

use crate::model::{ClassifiedCell, TemperatureThreshold};

/// `clip((value - moderate) / (max - moderate) * 100, 0, 100)` where `max`
/// is the largest value in `cells`. When no cell exceeds `moderate`, every
/// score is 0.
pub fn score_cells(cells: Vec<ClassifiedCell>, moderate: f64) -> Vec<ClassifiedCell> {
    score_by_excess(cells, |value| value - moderate)
}

/// Same normalization on distance past a temperature threshold: degrees
/// below `min_temp_f` for cold, degrees above `max_temp_f` for heat.
pub fn score_temperature_cells(
    cells: Vec<ClassifiedCell>,
    threshold: &TemperatureThreshold,
) -> Vec<ClassifiedCell> {
    match *threshold {
        TemperatureThreshold::Below { min_temp_f } => score_by_excess(cells, |v| min_temp_f - v),
        TemperatureThreshold::Above { max_temp_f } => score_by_excess(cells, |v| v - max_temp_f),
    }
}

fn score_by_excess(mut cells: Vec<ClassifiedCell>, excess: impl Fn(f64) -> f64) -> Vec<ClassifiedCell> {
    let max_excess = cells
        .iter()
        .map(|c| excess(c.value))
        .fold(f64::NEG_INFINITY, f64::max);

    for cell in &mut cells {
        let score = if max_excess > 0.0 {
            (excess(cell.value) / max_excess * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        cell.risk_score = Some(score);
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::{at_hour, classified};
    use crate::model::RiskLevel;

    fn scores(cells: &[ClassifiedCell]) -> Vec<f64> {
        cells.iter().map(|c| c.risk_score.expect("every cell is scored")).collect()
    }

    #[test]
    fn test_scenario_scores_are_25_and_100() {
        let cells = vec![
            classified(-100.0, at_hour(12), 14.0, RiskLevel::Moderate),
            classified(-99.0, at_hour(12), 17.0, RiskLevel::High),
        ];
        assert_eq!(scores(&score_cells(cells, 13.0)), vec![25.0, 100.0]);
    }

    #[test]
    fn test_all_at_threshold_scores_zero() {
        let cells = vec![
            classified(-100.0, at_hour(12), 13.0, RiskLevel::Moderate),
            classified(-99.0, at_hour(12), 13.0, RiskLevel::Moderate),
        ];
        assert_eq!(scores(&score_cells(cells, 13.0)), vec![0.0, 0.0]);
    }

    #[test]
    fn test_scores_are_bounded_and_monotone() {
        let values = [13.0, 13.5, 14.2, 15.0, 16.0, 18.7, 22.1, 30.0];
        let cells: Vec<ClassifiedCell> = values
            .iter()
            .rev()
            .enumerate()
            .map(|(i, &v)| classified(-100.0 + i as f64, at_hour(0), v, RiskLevel::Moderate))
            .collect();
        let mut scored = score_cells(cells, 13.0);
        scored.sort_by(|a, b| a.value.total_cmp(&b.value));

        let s = scores(&scored);
        assert_eq!(s[0], 0.0, "value at moderate scores 0");
        assert_eq!(*s.last().unwrap(), 100.0, "maximum value scores 100");
        for pair in s.windows(2) {
            assert!(pair[0] <= pair[1], "scores must not decrease: {:?}", s);
        }
        assert!(s.iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_empty_set_is_fine() {
        assert!(score_cells(Vec::new(), 13.0).is_empty());
    }

    #[test]
    fn test_cold_cells_score_on_degrees_below() {
        let mut cold = classified(-100.0, at_hour(6), 0.0, RiskLevel::Unsafe);
        cold.value = 10.0;
        let mut coldest = classified(-99.0, at_hour(6), 0.0, RiskLevel::Unsafe);
        coldest.value = 0.0;
        let scored = score_temperature_cells(
            vec![cold, coldest],
            &TemperatureThreshold::Below { min_temp_f: 20.0 },
        );
        assert_eq!(scores(&scored), vec![50.0, 100.0]);
    }
}
