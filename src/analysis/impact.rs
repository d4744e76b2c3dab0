//! Asset impact analysis.
//!
//! Buffers asset points in Web Mercator and inner-joins the buffers against
//! classified cells. Every failure path degrades to the pre-join cells and
//! is reported through `ImpactOutcome`; nothing here aborts an analysis.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use geo::BoundingRect;

use crate::error::AnalysisError;
use crate::geometry::{EnvelopeIndex, GeometryProvider};
use crate::logging::{self, Diagnostic, Severity, Stage};
use crate::model::{AssetPoint, BufferedAsset, ClassifiedCell};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What the impact stage actually did.
#[derive(Debug, Clone, PartialEq)]
pub enum ImpactOutcome {
    NotRequested,
    NoAssetData,
    /// The join matched. `matched_rows` counts cell/asset pairs before
    /// deduplication; `unique_cells` after.
    Intersected { matched_rows: usize, unique_cells: usize },
    NoIntersection,
    BufferFailed(AnalysisError),
    JoinFailed(AnalysisError),
}

impl ImpactOutcome {
    /// True only when the join ran and produced rows.
    pub fn intersection_performed(&self) -> bool {
        matches!(self, ImpactOutcome::Intersected { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpactResult {
    pub cells: Vec<ClassifiedCell>,
    pub outcome: ImpactOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// One row of the cell × buffer inner join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedRow {
    pub cell_index: usize,
    pub asset_id: String,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

pub struct AssetImpactAnalyzer<'a> {
    provider: &'a dyn GeometryProvider,
    buffer_radius_m: f64,
}

impl<'a> AssetImpactAnalyzer<'a> {
    pub fn new(provider: &'a dyn GeometryProvider, buffer_radius_m: f64) -> Self {
        Self {
            provider,
            buffer_radius_m,
        }
    }

    pub fn analyze(
        &self,
        cells: Vec<ClassifiedCell>,
        assets: Option<&[AssetPoint]>,
        requested: bool,
    ) -> ImpactResult {
        if !requested {
            return ImpactResult {
                cells,
                outcome: ImpactOutcome::NotRequested,
                diagnostics: Vec::new(),
            };
        }

        let assets = match assets {
            Some(a) if !a.is_empty() => a,
            _ => {
                let note = logging::record_note(
                    Stage::AssetImpact,
                    Severity::Warning,
                    "Asset impact requested but no asset data was available",
                );
                return ImpactResult {
                    cells,
                    outcome: ImpactOutcome::NoAssetData,
                    diagnostics: vec![note],
                };
            }
        };

        let buffers = match self.buffer_assets(assets) {
            Ok(b) => b,
            Err(e) => {
                let diag = logging::record_failure(Stage::AssetImpact, "Buffering assets", &e);
                return ImpactResult {
                    cells,
                    outcome: ImpactOutcome::BufferFailed(e),
                    diagnostics: vec![diag],
                };
            }
        };

        let rows = match self.spatial_join(&cells, &buffers) {
            Ok(rows) => rows,
            Err(e) => {
                let diag = logging::record_failure(Stage::AssetImpact, "Spatial join", &e);
                return ImpactResult {
                    cells,
                    outcome: ImpactOutcome::JoinFailed(e),
                    diagnostics: vec![diag],
                };
            }
        };

        if rows.is_empty() {
            let note = logging::record_note(
                Stage::AssetImpact,
                Severity::Info,
                "No risk cells intersected buffered assets",
            );
            return ImpactResult {
                cells,
                outcome: ImpactOutcome::NoIntersection,
                diagnostics: vec![note],
            };
        }

        let matched_rows = rows.len();
        let joined: Vec<ClassifiedCell> = rows.iter().map(|r| cells[r.cell_index].clone()).collect();
        let unique = dedup_cells(joined);
        tracing::info!(
            stage = %Stage::AssetImpact,
            "Join matched {} rows, {} unique cells",
            matched_rows,
            unique.len()
        );

        ImpactResult {
            outcome: ImpactOutcome::Intersected {
                matched_rows,
                unique_cells: unique.len(),
            },
            cells: unique,
            diagnostics: Vec::new(),
        }
    }

    /// Buffers every asset; the first failure aborts the whole stage.
    pub fn buffer_assets(&self, assets: &[AssetPoint]) -> Result<Vec<BufferedAsset>, AnalysisError> {
        assets
            .iter()
            .map(|asset| {
                let geometry = self.provider.buffer_point(asset.location, self.buffer_radius_m)?;
                Ok(BufferedAsset {
                    asset_id: asset.id.clone(),
                    radius_m: self.buffer_radius_m,
                    geometry,
                })
            })
            .collect()
    }

    /// Inner join on `cell intersects buffer`. Rows come out in cell order,
    /// then buffer order. Cells must be projectable into the metric CRS.
    pub fn spatial_join(
        &self,
        cells: &[ClassifiedCell],
        buffers: &[BufferedAsset],
    ) -> Result<Vec<JoinedRow>, AnalysisError> {
        let index = EnvelopeIndex::from_polygons(buffers.iter().map(|b| &b.geometry));
        let mut rows = Vec::new();

        for (cell_index, cell) in cells.iter().enumerate() {
            let geometry = &cell.cell.geometry;
            self.provider.check_projectable(geometry)?;
            let Some(rect) = geometry.bounding_rect() else {
                return Err(AnalysisError::SpatialJoin(format!(
                    "cell {} has an empty geometry",
                    cell_index
                )));
            };
            for buffer_index in index.candidates(&rect) {
                let buffer = &buffers[buffer_index];
                if self.provider.intersects(geometry, &buffer.geometry)? {
                    rows.push(JoinedRow {
                        cell_index,
                        asset_id: buffer.asset_id.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }
}

/// Drops repeated (geometry, forecast_time) pairs, keeping the first
/// occurrence and the input order. Idempotent.
pub fn dedup_cells(cells: Vec<ClassifiedCell>) -> Vec<ClassifiedCell> {
    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::with_capacity(cells.len());
    cells
        .into_iter()
        .filter(|c| seen.insert((c.cell.geometry_key.clone(), c.cell.forecast_time)))
        .collect()
}
