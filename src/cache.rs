//! Caller-owned cache of asset classification results.
//!
//! Keys are explicit (region, forecast date, layer, threshold) and entries
//! only leave through `invalidate*` or `clear`. The cache is passed into
//! each call by `&mut`; the engine holds no cache of its own.

use std::collections::HashMap;

use crate::analysis::zones::AssetRiskResult;
use crate::model::{AssetLayer, TemperatureThreshold};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased region name.
    pub region: String,
    /// Forecast date or time filter the zones were built from.
    pub date: String,
    pub layer: AssetLayer,
    /// Display form of the threshold, e.g. "below 20°F".
    pub threshold: String,
}

impl CacheKey {
    pub fn new(region: &str, date: impl Into<String>, layer: AssetLayer, threshold: &TemperatureThreshold) -> Self {
        Self {
            region: region.trim().to_lowercase(),
            date: date.into(),
            layer,
            threshold: threshold.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneAssetCache {
    entries: HashMap<CacheKey, AssetRiskResult>,
}

impl ZoneAssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&AssetRiskResult> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, result: AssetRiskResult) {
        self.entries.insert(key, result);
    }

    pub fn invalidate(&mut self, key: &CacheKey) -> Option<AssetRiskResult> {
        self.entries.remove(key)
    }

    /// Drops every entry for `region`; returns how many were removed.
    pub fn invalidate_region(&mut self, region: &str) -> usize {
        let region = region.trim().to_lowercase();
        let before = self.entries.len();
        self.entries.retain(|k, _| k.region != region);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
