/// Integration tests for the wind risk pipeline.
///
/// Drives `WindRiskAnalyzer` directly and through `HazardService` with
/// in-memory forecast, region and asset collaborators. No network or
/// database is needed.
///
/// Run with: cargo test --test wind_risk_pipeline

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use geo::{MultiPolygon, Polygon, polygon};

use hazard_engine::analysis::impact::ImpactOutcome;
use hazard_engine::analysis::wind::WindRiskAnalyzer;
use hazard_engine::cache::ZoneAssetCache;
use hazard_engine::config::{AssetConfig, EngineConfig};
use hazard_engine::geometry::WebMercator;
use hazard_engine::ingest::assets::RawAssetRow;
use hazard_engine::ingest::forecast::RawForecastRow;
use hazard_engine::model::{AnalysisType, AssetLayer, AssetPoint, ForecastCell, RiskLevel, RiskThresholds};
use hazard_engine::regions::{Region, RegionCatalog, RegionKind};
use hazard_engine::service::{AnalysisOutcome, HazardService};
use hazard_engine::sources::{InMemoryAssets, InMemoryForecasts};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

fn square(lon: f64, lat: f64) -> Polygon<f64> {
    polygon![
        (x: lon, y: lat),
        (x: lon + 0.25, y: lat),
        (x: lon + 0.25, y: lat + 0.25),
        (x: lon, y: lat + 0.25),
        (x: lon, y: lat)
    ]
}

fn wind(lon: f64, time: DateTime<Utc>, speed: f64) -> ForecastCell {
    ForecastCell::new(square(lon, 41.0), time, Some(speed), None)
}

fn thresholds() -> RiskThresholds {
    RiskThresholds::new(13.0, 16.0).expect("13/16 are ordered")
}

fn iowa() -> Region {
    Region {
        name: "Iowa".to_string(),
        kind: RegionKind::State,
        state: Some("Iowa".to_string()),
        geometry: MultiPolygon(vec![polygon![
            (x: -96.6, y: 40.4),
            (x: -90.1, y: 40.4),
            (x: -90.1, y: 43.5),
            (x: -96.6, y: 43.5),
            (x: -96.6, y: 40.4)
        ]]),
    }
}

fn forecast_row(lon: f64, time: &str, speed: f64) -> RawForecastRow {
    RawForecastRow {
        geography: Some(format!(
            "{{\"type\":\"Polygon\",\"coordinates\":[[[{w},41.0],[{e},41.0],[{e},41.25],[{w},41.25],[{w},41.0]]]}}",
            w = lon,
            e = lon + 0.25
        )),
        forecast_time: Some(time.to_string()),
        wind_speed: Some(speed),
        temperature: None,
    }
}

fn power_row(id: &str, lon: f64, lat: f64) -> RawAssetRow {
    RawAssetRow {
        id: Some(id.to_string()),
        geometry: Some(format!("{{\"type\":\"Point\",\"coordinates\":[{},{}]}}", lon, lat)),
        category: Some("transmission".to_string()),
        voltage_kv: Some(345.0),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Classification and scoring
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_a_single_timestamp() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let cells = vec![
        wind(-94.0, at(1, 12), 10.0),
        wind(-93.0, at(1, 12), 14.0),
        wind(-92.0, at(1, 12), 17.0),
    ];

    let result = analyzer.analyze(&cells, None, false);

    assert_eq!(result.summary.event_count, 1);
    let scored = &result.risk_events["wind_event_20240501_1200"];
    let values: Vec<f64> = scored.iter().map(|c| c.value).collect();
    let scores: Vec<f64> = scored.iter().map(|c| c.risk_score.unwrap()).collect();
    assert_eq!(values, vec![14.0, 17.0]);
    assert_eq!(scores, vec![25.0, 100.0]);
    assert_eq!(scored[0].risk_level, RiskLevel::Moderate);
    assert_eq!(scored[1].risk_level, RiskLevel::High);
    assert_eq!(result.summary.high_risk_areas, 1);
    assert_eq!(result.summary.moderate_risk_areas, 1);
    assert_eq!(result.summary.highest_risk_timestamp.as_deref(), Some("2024-05-01 12:00 UTC"));
}

#[test]
fn test_scenario_a_two_timestamps() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let cells = vec![
        wind(-94.0, at(1, 12), 10.0),
        wind(-93.0, at(1, 12), 14.0),
        wind(-92.0, at(1, 18), 17.0),
    ];

    let result = analyzer.analyze(&cells, None, false);

    assert_eq!(result.summary.event_count, 2);
    let ids: Vec<&str> = result.risk_events.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["wind_event_20240501_1200", "wind_event_20240501_1800"]);
    let event_ids: Vec<&str> = result.summary.events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(event_ids, ids, "summary events are in ascending time order");
    assert_eq!(result.summary.highest_risk_timestamp.as_deref(), Some("2024-05-01 18:00 UTC"));
    assert_eq!(result.summary.message, "Found 2 timestamps with general wind risk areas.");
}

#[test]
fn test_scenario_b_empty_input() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());

    let result = analyzer.analyze(&[], None, true);

    assert!(!result.summary.risk_found);
    assert_eq!(result.summary.message, "Input weather data is empty.");
    assert!(result.risk_events.is_empty());
}

#[test]
fn test_scores_are_monotone_in_value() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let speeds = [13.0, 21.0, 15.5, 13.2, 18.0, 16.0];
    let cells: Vec<ForecastCell> = speeds
        .iter()
        .enumerate()
        .map(|(i, s)| wind(-95.0 + i as f64, at(1, 6), *s))
        .collect();

    let result = analyzer.analyze(&cells, None, false);

    let mut scored: Vec<(f64, f64)> = result
        .risk_events
        .values()
        .flatten()
        .map(|c| (c.value, c.risk_score.unwrap()))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(scored.first().map(|s| s.1), Some(0.0), "value at moderate scores 0");
    assert_eq!(scored.last().map(|s| s.1), Some(100.0), "max value scores 100");
    for pair in scored.windows(2) {
        assert!(pair[0].1 <= pair[1].1, "scores must not decrease: {:?}", pair);
    }
}

#[test]
fn test_events_partition_qualifying_cells() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let cells = vec![
        wind(-95.0, at(1, 6), 14.0),
        wind(-94.0, at(1, 12), 8.0),
        wind(-93.0, at(1, 12), 19.0),
        wind(-92.0, at(1, 18), 13.0),
        wind(-91.0, at(1, 6), 16.0),
    ];

    let result = analyzer.analyze(&cells, None, false);

    let total: usize = result.risk_events.values().map(Vec::len).sum();
    assert_eq!(total, 4, "every qualifying cell lands in exactly one event");
    for (id, group) in &result.risk_events {
        let first = group[0].cell.forecast_time;
        assert!(group.iter().all(|c| c.cell.forecast_time == first), "{} mixes timestamps", id);
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let cells = vec![
        wind(-94.0, at(1, 12), 14.0),
        wind(-93.0, at(2, 0), 17.0),
        wind(-92.0, at(1, 12), 16.2),
    ];
    let assets = vec![AssetPoint::at("line-1", -93.9, 41.1)];

    let first = analyzer.analyze(&cells, Some(&assets), true);
    let second = analyzer.analyze(&cells, Some(&assets), true);

    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Asset impact
// ---------------------------------------------------------------------------

#[test]
fn test_scenario_c_no_asset_data() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let cells = vec![wind(-94.0, at(1, 12), 17.0)];

    let result = analyzer.analyze(&cells, None, true);

    assert_eq!(result.summary.analysis_type, AnalysisType::General);
    assert!(
        result.summary.message.contains("data unavailable"),
        "message should name missing asset data: {}",
        result.summary.message
    );
    assert_eq!(result.impact, ImpactOutcome::NoAssetData);
}

#[test]
fn test_assets_narrow_cells_to_impacted_ones() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let cells = vec![wind(-94.0, at(1, 12), 14.0), wind(-93.0, at(1, 12), 17.0)];
    let assets = vec![AssetPoint::at("line-1", -93.9, 41.1)];

    let result = analyzer.analyze(&cells, Some(&assets), true);

    assert_eq!(result.summary.analysis_type, AnalysisType::AssetImpact);
    assert_eq!(result.summary.message, "Found 1 timestamps with potential power line impacts.");
    assert_eq!(result.impact, ImpactOutcome::Intersected { matched_rows: 1, unique_cells: 1 });
    let kept = &result.risk_events["wind_event_20240501_1200"];
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].value, 14.0);
    assert_eq!(result.summary.affected_estimate_km, 0.25);
}

#[test]
fn test_assets_far_away_fall_back_to_general() {
    let provider = WebMercator::default();
    let analyzer = WindRiskAnalyzer::new(thresholds(), &provider, &AssetConfig::default());
    let cells = vec![wind(-94.0, at(1, 12), 14.0), wind(-93.0, at(1, 12), 17.0)];
    let assets = vec![AssetPoint::at("far", -80.0, 35.0)];

    let result = analyzer.analyze(&cells, Some(&assets), true);

    assert_eq!(result.impact, ImpactOutcome::NoIntersection);
    assert_eq!(result.summary.analysis_type, AnalysisType::General);
    assert_eq!(result.summary.affected_estimate_km, 0.0);
    assert_eq!(result.risk_events["wind_event_20240501_1200"].len(), 2);
}

// ---------------------------------------------------------------------------
// Service end-to-end
// ---------------------------------------------------------------------------

#[test]
fn test_service_runs_wind_with_power_lines() {
    let init = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let forecasts = InMemoryForecasts::new().with_run(
        init,
        vec![
            forecast_row(-94.0, "2024-05-01T12:00:00Z", 14.0),
            forecast_row(-93.0, "2024-05-01T12:00:00Z", 17.0),
            forecast_row(-93.0, "2024-05-02 06:00:00", 12.0),
            // Outside Iowa; dropped by the region filter.
            forecast_row(-80.0, "2024-05-01T12:00:00Z", 25.0),
        ],
    );
    let regions = RegionCatalog::new(vec![iowa()], Vec::new());
    let assets = InMemoryAssets::new().with_layer(
        AssetLayer::PowerInfrastructure,
        vec![power_row("line-1", -92.9, 41.1), power_row("line-far", -75.0, 40.0)],
    );
    let config = EngineConfig::default();
    let provider = config.geometry_provider();
    let service = HazardService::new(config, &forecasts, &regions, &assets, &provider);

    let response = service.handle_json(
        r#"{"action":"analyze_wind_risk","region":"Iowa","init_date":"2024-05-01","analyze_power_lines":true}"#,
        &mut ZoneAssetCache::new(),
    );

    let AnalysisOutcome::Wind { payload } = &response.outcome else {
        panic!("expected a wind outcome, got {:?}", response.outcome);
    };
    assert_eq!(payload.risk_summary.analysis_type, AnalysisType::AssetImpact);
    assert_eq!(payload.risk_summary.event_count, 1);
    let cells = &payload.risk_events["wind_event_20240501_1200"];
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].value, 17.0);
    assert_eq!(response.bounds.boxes().len(), 1);

    let json: serde_json::Value = serde_json::to_value(&response).expect("response serializes");
    assert_eq!(json["outcome"]["kind"], "wind");
    assert_eq!(json["outcome"]["payload"]["risk_summary"]["analysis_type"], "asset-impact");
    assert_eq!(json["bounds"][0][0][0], 40.4);
}

#[test]
fn test_service_without_power_layer_stays_general() {
    let init = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let forecasts = InMemoryForecasts::new().with_run(init, vec![forecast_row(-94.0, "2024-05-01T12:00:00Z", 17.0)]);
    let regions = RegionCatalog::new(vec![iowa()], Vec::new());
    let assets = InMemoryAssets::new();
    let config = EngineConfig::default();
    let provider = config.geometry_provider();
    let service = HazardService::new(config, &forecasts, &regions, &assets, &provider);

    let response = service.handle_json(
        r#"{"action":"analyze_wind_risk","region":"Iowa","init_date":"2024-05-01","analyze_power_lines":true}"#,
        &mut ZoneAssetCache::new(),
    );

    let AnalysisOutcome::Wind { payload } = response.outcome else {
        panic!("expected a wind outcome");
    };
    assert_eq!(payload.risk_summary.analysis_type, AnalysisType::General);
    assert!(payload.risk_summary.message.contains("power line data unavailable"));
    assert!(
        !payload.risk_summary.diagnostics.is_empty(),
        "the failed layer load is reported"
    );
}

#[test]
fn test_service_region_without_cells() {
    let init = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let forecasts = InMemoryForecasts::new().with_run(init, vec![forecast_row(-80.0, "2024-05-01T12:00:00Z", 17.0)]);
    let regions = RegionCatalog::new(vec![iowa()], Vec::new());
    let assets = InMemoryAssets::new();
    let config = EngineConfig::default();
    let provider = config.geometry_provider();
    let service = HazardService::new(config, &forecasts, &regions, &assets, &provider);

    let response = service.handle_json(
        r#"{"action":"analyze_wind_risk","region":"Iowa","init_date":"2024-05-01"}"#,
        &mut ZoneAssetCache::new(),
    );

    let AnalysisOutcome::Wind { payload } = response.outcome else {
        panic!("expected a wind outcome");
    };
    assert!(!payload.risk_summary.risk_found);
    assert_eq!(payload.risk_summary.message, "No weather data points found within Iowa.");
}
