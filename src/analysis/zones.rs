//! Temperature hazard zones and point-asset classification.
//!
//! Single-threshold variant of the wind pipeline: cells crossing a cold or
//! heat threshold inside a region become zones, and point assets from an
//! optional layer are split into affected (inside any zone) and normal.
//! Display lists are capped and sampled by stride so repeated renders of
//! the same input are identical; counts are never capped.

use chrono::{DateTime, NaiveDate, Utc};
use geo::{Intersects, Polygon, Rect};
use serde::Serialize;

use crate::analysis::scoring::score_temperature_cells;
use crate::analysis::thresholds::classify_temperature;
use crate::cache::{CacheKey, ZoneAssetCache};
use crate::config::{SamplingConfig, SamplingProfile};
use crate::error::AnalysisError;
use crate::geometry::{EnvelopeIndex, GeometryProvider};
use crate::ingest::assets::parse_asset_rows;
use crate::ingest::forecast::{TimeFilter, filter_by_region, filter_time};
use crate::logging::{self, Diagnostic, Severity, Stage};
use crate::model::{AssetLayer, AssetPoint, ForecastCell, LatLonBounds, TemperatureThreshold};
use crate::regions::{self, Region};
use crate::render::serialize_polygon;
use crate::sources::AssetSource;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneFeature {
    #[serde(serialize_with = "serialize_polygon")]
    pub geometry: Polygon<f64>,
    pub forecast_time: DateTime<Utc>,
    pub temp_f: f64,
    pub risk_score: f64,
}

/// Unsafe zones with the color range the map should use.
///
/// Cold: `min_value` is the coldest zone, `max_value` the threshold.
/// Heat: `min_value` is the threshold, `max_value` the hottest zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureZones {
    pub features: Vec<ZoneFeature>,
    pub min_value: f64,
    pub max_value: f64,
    pub total_bounds: LatLonBounds,
    pub threshold: TemperatureThreshold,
}

/// A map marker for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetMarker {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
}

impl From<&AssetPoint> for AssetMarker {
    fn from(asset: &AssetPoint) -> Self {
        Self {
            id: asset.id.clone(),
            lat: asset.location.y(),
            lon: asset.location.x(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRiskResult {
    pub layer: AssetLayer,
    /// Capped for display.
    pub affected_assets: Vec<AssetMarker>,
    /// Stride sample of unaffected assets.
    pub normal_assets: Vec<AssetMarker>,
    pub at_risk_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetLayerStatus {
    NotRequested,
    Unavailable { message: String },
    Analyzed { result: AssetRiskResult },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneExtraction {
    pub zones: TemperatureZones,
    pub assets: AssetLayerStatus,
    pub diagnostics: Vec<Diagnostic>,
}

/// What to extract.
#[derive(Debug, Clone)]
pub struct ZoneQuery<'r> {
    pub region: &'r Region,
    /// Forecast run the cells come from.
    pub init_date: NaiveDate,
    pub threshold: TemperatureThreshold,
    pub time_filter: TimeFilter,
    pub layer: Option<AssetLayer>,
}

impl ZoneQuery<'_> {
    /// Key for `layer` results. `selected` is the concrete time filter the
    /// zones were built from (see [`resolve_time_filter`]), so two runs
    /// asking for "latest date" never share an entry.
    pub fn cache_key(&self, layer: AssetLayer, selected: &TimeFilter) -> CacheKey {
        CacheKey::new(
            &self.region.name,
            format!("run {} / {}", self.init_date.format("%Y-%m-%d"), selected.describe()),
            layer,
            &self.threshold,
        )
    }
}

/// Replaces `LatestDate` with the date the filtered cells actually carry.
pub fn resolve_time_filter(filter: &TimeFilter, kept: &[ForecastCell]) -> TimeFilter {
    match filter {
        TimeFilter::LatestDate => kept
            .iter()
            .map(|c| c.forecast_time.date_naive())
            .max()
            .map_or(TimeFilter::LatestDate, TimeFilter::Date),
        other => *other,
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Every `max(1, len / target)`-th item, then the first `target` of those.
pub fn stride_sample<T: Clone>(items: &[T], target: usize) -> Vec<T> {
    if target == 0 {
        return Vec::new();
    }
    let step = (items.len() / target).max(1);
    items.iter().step_by(step).take(target).cloned().collect()
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct HazardZoneExtractor<'a> {
    assets: &'a dyn AssetSource,
    provider: &'a dyn GeometryProvider,
    sampling: SamplingConfig,
}

impl<'a> HazardZoneExtractor<'a> {
    pub fn new(
        assets: &'a dyn AssetSource,
        provider: &'a dyn GeometryProvider,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            assets,
            provider,
            sampling,
        }
    }

    /// Builds zones for `query` and, if a layer is requested, classifies its
    /// assets. Fails with `NoHazardData` when nothing is left after the time
    /// filter, the region filter or the threshold; asset problems never
    /// fail the call and show up as `AssetLayerStatus::Unavailable`.
    pub fn extract(
        &self,
        cells: Vec<ForecastCell>,
        query: &ZoneQuery<'_>,
        cache: Option<&mut ZoneAssetCache>,
    ) -> Result<ZoneExtraction, AnalysisError> {
        let region_name = query.region.display_name();

        let cells = filter_time(cells, &query.time_filter);
        if cells.is_empty() {
            return Err(AnalysisError::NoHazardData(format!(
                "No weather data available for selected time filter: {}",
                query.time_filter.describe()
            )));
        }
        let selected = resolve_time_filter(&query.time_filter, &cells);

        let cells = filter_by_region(cells, &query.region.geometry);
        if cells.is_empty() {
            return Err(AnalysisError::NoHazardData(format!(
                "No weather data found for {}",
                region_name
            )));
        }

        let classification = classify_temperature(&cells, &query.threshold)?;
        let mut diagnostics = classification.diagnostics;
        if classification.cells.is_empty() {
            return Err(AnalysisError::NoHazardData(format!(
                "No unsafe temperatures ({}) found in {}",
                query.threshold, region_name
            )));
        }

        let scored = score_temperature_cells(classification.cells, &query.threshold);
        let features: Vec<ZoneFeature> = scored
            .into_iter()
            .map(|c| ZoneFeature {
                geometry: c.cell.geometry,
                forecast_time: c.cell.forecast_time,
                temp_f: c.value,
                risk_score: c.risk_score.unwrap_or(0.0),
            })
            .collect();
        tracing::info!(
            stage = %Stage::ZoneExtraction,
            "Found {} areas with temperatures {} in {}",
            features.len(),
            query.threshold,
            region_name
        );

        let limit = query.threshold.limit();
        let coldest = features.iter().map(|f| f.temp_f).fold(f64::INFINITY, f64::min);
        let hottest = features.iter().map(|f| f.temp_f).fold(f64::NEG_INFINITY, f64::max);
        let (min_value, max_value) = match query.threshold {
            TemperatureThreshold::Below { .. } => (coldest, limit),
            TemperatureThreshold::Above { .. } => (limit, hottest),
        };
        let total_bounds = LatLonBounds::of_polygons(features.iter().map(|f| &f.geometry))
            .ok_or_else(|| AnalysisError::NoHazardData(format!("Unsafe zones in {} have no extent", region_name)))?;

        let zone_polygons: Vec<Polygon<f64>> = features.iter().map(|f| f.geometry.clone()).collect();
        let zones = TemperatureZones {
            features,
            min_value,
            max_value,
            total_bounds,
            threshold: query.threshold,
        };

        let assets = match query.layer {
            None => AssetLayerStatus::NotRequested,
            Some(layer) => {
                let key = query.cache_key(layer, &selected);
                self.asset_status(layer, query.region, key, &zone_polygons, cache, &mut diagnostics)
            }
        };

        Ok(ZoneExtraction {
            zones,
            assets,
            diagnostics,
        })
    }

    fn asset_status(
        &self,
        layer: AssetLayer,
        region: &Region,
        key: CacheKey,
        zones: &[Polygon<f64>],
        cache: Option<&mut ZoneAssetCache>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> AssetLayerStatus {
        if let Err(e) = regions::layer_available_for(layer, region) {
            diagnostics.push(logging::record_failure(Stage::AssetLayer, "Checking layer coverage", &e));
            return AssetLayerStatus::Unavailable { message: e.to_string() };
        }

        if let Some(hit) = cache.as_deref().and_then(|c| c.get(&key)) {
            tracing::debug!(stage = %Stage::AssetLayer, "Using cached {} results", layer);
            return AssetLayerStatus::Analyzed { result: hit.clone() };
        }

        let assets = match self.load_layer(layer, region, diagnostics) {
            Ok(assets) => assets,
            Err(e) => {
                diagnostics.push(logging::record_failure(Stage::AssetLayer, "Loading asset layer", &e));
                return AssetLayerStatus::Unavailable { message: e.to_string() };
            }
        };

        let profile = self.sampling.profile_for(layer);
        let result = self.classify_assets(layer, &assets, zones, profile, diagnostics);
        if let Some(cache) = cache {
            cache.insert(key, result.clone());
        }
        AssetLayerStatus::Analyzed { result }
    }

    fn load_layer(
        &self,
        layer: AssetLayer,
        region: &Region,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<AssetPoint>, AnalysisError> {
        let rows = self.assets.load_assets(layer)?;
        let report = parse_asset_rows(&rows).map_err(|e| {
            AnalysisError::AssetLayerUnavailable(format!("Failed to load {} data: {}", layer, e))
        })?;
        diagnostics.extend(report.diagnostics);

        let nationwide = regions::find_layer(layer).is_some_and(|info| info.prefilter_to_region);
        if !nationwide {
            return Ok(report.assets);
        }
        let before = report.assets.len();
        let kept: Vec<AssetPoint> = report
            .assets
            .into_iter()
            .filter(|a| region.geometry.intersects(&a.location))
            .collect();
        logging::log_filter_summary(Stage::AssetLayer, "assets to region", before, kept.len());
        Ok(kept)
    }

    /// Splits assets into affected / normal. A predicate failure marks
    /// every asset normal and is reported as a diagnostic.
    pub fn classify_assets(
        &self,
        layer: AssetLayer,
        assets: &[AssetPoint],
        zones: &[Polygon<f64>],
        profile: SamplingProfile,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> AssetRiskResult {
        let flags = match self.affected_flags(assets, zones) {
            Ok(flags) => flags,
            Err(e) => {
                diagnostics.push(logging::record_failure(
                    Stage::AssetLayer,
                    "Intersecting assets with zones",
                    &e,
                ));
                vec![false; assets.len()]
            }
        };

        let (affected, unaffected): (Vec<(&AssetPoint, bool)>, Vec<(&AssetPoint, bool)>) =
            assets.iter().zip(flags).partition(|(_, hit)| *hit);
        let at_risk_count = affected.len();
        let unaffected: Vec<AssetMarker> = unaffected.iter().map(|(a, _)| AssetMarker::from(*a)).collect();

        if at_risk_count > 0 {
            diagnostics.push(logging::record_note(
                Stage::AssetLayer,
                Severity::Info,
                format!("{} of {} {} assets affected", at_risk_count, assets.len(), layer),
            ));
        }

        AssetRiskResult {
            layer,
            affected_assets: affected
                .iter()
                .take(profile.display_cap)
                .map(|(a, _)| AssetMarker::from(*a))
                .collect(),
            normal_assets: stride_sample(&unaffected, profile.sample_target),
            at_risk_count,
            total_count: assets.len(),
        }
    }

    /// Two-stage point-in-zones test: R-tree over zone boxes, then the
    /// provider's exact predicate.
    fn affected_flags(&self, assets: &[AssetPoint], zones: &[Polygon<f64>]) -> Result<Vec<bool>, AnalysisError> {
        let index = EnvelopeIndex::from_polygons(zones);
        assets
            .iter()
            .map(|asset| {
                let at = Rect::new(asset.location.0, asset.location.0);
                for i in index.candidates(&at) {
                    if self.provider.point_intersects(&asset.location, &zones[i])? {
                        return Ok(true);
                    }
                }
                Ok(false)
            })
            .collect()
    }
}
