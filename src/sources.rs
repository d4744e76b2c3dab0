//! Data collaborators.
//!
//! The engine never queries a warehouse itself. A `ForecastSource` hands it
//! raw forecast rows for an initialization date and an `AssetSource` hands
//! it raw asset rows per layer. The in-memory implementations back tests and
//! callers that already hold the data.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::AnalysisError;
use crate::ingest::assets::RawAssetRow;
use crate::ingest::forecast::RawForecastRow;
use crate::model::AssetLayer;

pub trait ForecastSource {
    /// Every forecast row produced by the model run initialized on `init_date`.
    fn fetch_rows(&self, init_date: NaiveDate) -> Result<Vec<RawForecastRow>, AnalysisError>;
}

pub trait AssetSource {
    fn load_assets(&self, layer: AssetLayer) -> Result<Vec<RawAssetRow>, AnalysisError>;
}

/// Forecast rows keyed by initialization date.
#[derive(Debug, Clone, Default)]
pub struct InMemoryForecasts {
    runs: HashMap<NaiveDate, Vec<RawForecastRow>>,
}

impl InMemoryForecasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(mut self, init_date: NaiveDate, rows: Vec<RawForecastRow>) -> Self {
        self.runs.insert(init_date, rows);
        self
    }
}

impl ForecastSource for InMemoryForecasts {
    /// An unknown date yields no rows; ingest reports that as empty input.
    fn fetch_rows(&self, init_date: NaiveDate) -> Result<Vec<RawForecastRow>, AnalysisError> {
        Ok(self.runs.get(&init_date).cloned().unwrap_or_default())
    }
}

/// Asset rows keyed by layer. A layer that was never added fails to load.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    layers: HashMap<AssetLayer, Vec<RawAssetRow>>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: AssetLayer, rows: Vec<RawAssetRow>) -> Self {
        self.layers.insert(layer, rows);
        self
    }
}

impl AssetSource for InMemoryAssets {
    fn load_assets(&self, layer: AssetLayer) -> Result<Vec<RawAssetRow>, AnalysisError> {
        self.layers.get(&layer).cloned().ok_or_else(|| {
            AnalysisError::AssetLayerUnavailable(format!("Failed to load {} data", layer))
        })
    }
}
