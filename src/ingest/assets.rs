//! Asset row ingest and region pre-filtering.

use geo::{BoundingRect, Intersects, MultiPolygon};
use serde::Deserialize;

use crate::error::AnalysisError;
use crate::geometry::index::{expand_rect, rects_overlap};
use crate::geometry::projection::buffer_margin_degrees;
use crate::geometry::{self, EnvelopeIndex, GeometryProvider};
use crate::logging::{self, Diagnostic, Severity, Stage};
use crate::model::AssetPoint;

/// One asset row from the asset store. `geometry` is a GeoJSON point.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawAssetRow {
    pub id: Option<String>,
    pub geometry: Option<String>,
    pub category: Option<String>,
    pub voltage_kv: Option<f64>,
    pub capacity_mw: Option<f64>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetIngestReport {
    pub assets: Vec<AssetPoint>,
    pub skipped_geometry: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Converts rows into assets, skipping rows whose point does not parse.
/// Rows without an id get `asset-{row}`.
pub fn parse_asset_rows(rows: &[RawAssetRow]) -> Result<AssetIngestReport, AnalysisError> {
    if rows.is_empty() {
        return Err(AnalysisError::EmptyInput("asset"));
    }
    if rows.iter().all(|r| r.geometry.is_none()) {
        return Err(AnalysisError::MissingField(vec!["geometry".to_string()]));
    }

    let mut assets = Vec::with_capacity(rows.len());
    let mut skipped_geometry = 0;
    for (i, row) in rows.iter().enumerate() {
        let parsed = row
            .geometry
            .as_deref()
            .ok_or_else(|| "geometry is missing".to_string())
            .and_then(geometry::parse_point);
        let location = match parsed {
            Ok(point) => point,
            Err(reason) => {
                skipped_geometry += 1;
                tracing::debug!(
                    stage = %Stage::AssetLayer,
                    "{}",
                    AnalysisError::GeometryParse { row: i, reason }
                );
                continue;
            }
        };
        assets.push(AssetPoint {
            id: row.id.clone().unwrap_or_else(|| format!("asset-{}", i)),
            location,
            category: row.category.clone(),
            voltage_kv: row.voltage_kv,
            capacity_mw: row.capacity_mw,
            owner: row.owner.clone(),
        });
    }

    let mut diagnostics = Vec::new();
    if skipped_geometry > 0 {
        diagnostics.push(logging::record_note(
            Stage::AssetLayer,
            Severity::Warning,
            format!("Skipped {} asset rows with missing or invalid geometry", skipped_geometry),
        ));
    }

    Ok(AssetIngestReport {
        assets,
        skipped_geometry,
        diagnostics,
    })
}

/// Keeps assets within `radius_m` of `region`.
///
/// Stage one drops assets outside the region's bounding box grown by a
/// degree margin that contains any Web Mercator buffer of `radius_m`.
/// Stage two buffers the survivors through `provider` and keeps those whose
/// buffer intersects a region polygon. Buffering failures are returned so
/// the caller can fall back.
pub fn prefilter_assets_to_region(
    assets: Vec<AssetPoint>,
    region: &MultiPolygon<f64>,
    radius_m: f64,
    provider: &dyn GeometryProvider,
) -> Result<Vec<AssetPoint>, AnalysisError> {
    let before = assets.len();
    let Some(region_rect) = region.bounding_rect() else {
        return Ok(Vec::new());
    };
    let search_rect = expand_rect(region_rect, buffer_margin_degrees(radius_m));

    let rough: Vec<AssetPoint> = assets
        .into_iter()
        .filter(|a| {
            let p = a.location;
            p.x() >= search_rect.min().x
                && p.x() <= search_rect.max().x
                && p.y() >= search_rect.min().y
                && p.y() <= search_rect.max().y
        })
        .collect();
    tracing::debug!(
        stage = %Stage::AssetLayer,
        "Initial bounding box filter: {} of {} assets",
        rough.len(),
        before
    );

    let parts = EnvelopeIndex::from_polygons(&region.0);
    let mut kept = Vec::with_capacity(rough.len());
    for asset in rough {
        if region.intersects(&asset.location) {
            kept.push(asset);
            continue;
        }
        let buffer = provider.buffer_point(asset.location, radius_m)?;
        let Some(buffer_rect) = buffer.bounding_rect() else {
            continue;
        };
        if !rects_overlap(&buffer_rect, &region_rect) {
            continue;
        }
        let mut hit = false;
        for i in parts.candidates(&buffer_rect) {
            if provider.intersects(&buffer, &region.0[i])? {
                hit = true;
                break;
            }
        }
        if hit {
            kept.push(asset);
        }
    }

    logging::log_filter_summary(Stage::AssetLayer, "assets by buffered region", before, kept.len());
    Ok(kept)
}
