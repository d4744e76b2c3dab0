//! Grouping scored cells into per-timestamp risk events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::logging::Stage;
use crate::model::{ClassifiedCell, RiskEvent, RiskLevel};

/// Deterministic event id, e.g. `wind_event_20240501_1200`.
pub fn event_id(forecast_time: DateTime<Utc>) -> String {
    format!("wind_event_{}", forecast_time.format("%Y%m%d_%H%M"))
}

/// Id with seconds, used only when two steps fall in the same minute.
fn event_id_with_seconds(forecast_time: DateTime<Utc>) -> String {
    format!("wind_event_{}", forecast_time.format("%Y%m%d_%H%M%S"))
}

/// Display form, e.g. `2024-05-01 12:00 UTC`.
pub fn display_timestamp(forecast_time: DateTime<Utc>) -> String {
    forecast_time.format("%Y-%m-%d %H:%M UTC").to_string()
}

/// Events in ascending time order plus the cells of each, keyed by event id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventSet {
    pub events: Vec<RiskEvent>,
    pub cells_by_event: BTreeMap<String, Vec<ClassifiedCell>>,
}

/// Partitions `cells` by exact `forecast_time`.
///
/// Every input cell lands in exactly one event; within an event, cells keep
/// their input order. `affected_estimate_km` is set only when
/// `intersection_performed`, as `km_per_cell` times the cell count.
pub fn group_events(
    cells: Vec<ClassifiedCell>,
    intersection_performed: bool,
    km_per_cell: f64,
) -> EventSet {
    let mut by_time: BTreeMap<DateTime<Utc>, Vec<ClassifiedCell>> = BTreeMap::new();
    for cell in cells {
        by_time.entry(cell.cell.forecast_time).or_default().push(cell);
    }

    let mut set = EventSet::default();
    for (forecast_time, group) in by_time {
        if group.is_empty() {
            continue;
        }
        let high_count = group
            .iter()
            .filter(|c| matches!(c.risk_level, RiskLevel::High | RiskLevel::Unsafe))
            .count();
        let moderate_count = group.len() - high_count;
        let max_value = group.iter().map(|c| c.value).fold(f64::NEG_INFINITY, f64::max);

        let mut id = event_id(forecast_time);
        if set.cells_by_event.contains_key(&id) {
            id = event_id_with_seconds(forecast_time);
        }
        set.events.push(RiskEvent {
            id: id.clone(),
            forecast_time,
            timestamp: display_timestamp(forecast_time),
            high_count,
            moderate_count,
            max_value,
            affected_estimate_km: intersection_performed.then(|| group.len() as f64 * km_per_cell),
            overall_level: if high_count > 0 {
                RiskLevel::High
            } else {
                RiskLevel::Moderate
            },
        });
        set.cells_by_event.insert(id, group);
    }

    tracing::info!(
        stage = %Stage::EventGrouping,
        "Grouped risk cells into {} events",
        set.events.len()
    );
    set
}
