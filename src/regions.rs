//! Region resolution and asset-layer availability.
//!
//! Place names from the request ("Iowa", "McLean County") resolve to a
//! boundary polygon through a `RegionResolver`. `RegionCatalog` is the
//! in-memory resolver built from state and county GeoJSON collections.
//!
//! `ASSET_LAYER_REGISTRY` is the single source of truth for which asset
//! layers exist where; availability is checked here before any asset data
//! is loaded or joined.

use geo::{BoundingRect, MultiPolygon};
use geojson::{FeatureCollection, GeoJson};

use crate::error::AnalysisError;
use crate::geometry;
use crate::model::{AssetLayer, LatLonBounds};

// ---------------------------------------------------------------------------
// Regions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    State,
    County,
}

/// A resolved state or county boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub kind: RegionKind,
    /// Containing state; for a state this is its own name.
    pub state: Option<String>,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    pub fn bounds(&self) -> Option<LatLonBounds> {
        self.geometry.bounding_rect().map(LatLonBounds::from_rect)
    }

    /// "McLean County, Illinois" / "Iowa"
    pub fn display_name(&self) -> String {
        match (&self.kind, &self.state) {
            (RegionKind::County, Some(state)) => format!("{}, {}", self.name, state),
            _ => self.name.clone(),
        }
    }
}

/// Resolves a place name to a single boundary.
pub trait RegionResolver {
    fn resolve(&self, name: &str) -> Result<Region, AnalysisError>;
}

/// States and counties held in memory.
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    states: Vec<Region>,
    counties: Vec<Region>,
}

impl RegionCatalog {
    pub fn new(states: Vec<Region>, counties: Vec<Region>) -> Self {
        Self { states, counties }
    }

    /// Builds a catalog from two GeoJSON FeatureCollections. States are named
    /// by `state_name` (or `name`); counties by `county_name` (or `name`)
    /// with an optional `state_name`. Features whose geometry does not parse
    /// are skipped with a warning.
    pub fn from_geojson(states: &str, counties: &str) -> Result<Self, AnalysisError> {
        Ok(Self {
            states: regions_from_collection(states, RegionKind::State)?,
            counties: regions_from_collection(counties, RegionKind::County)?,
        })
    }

    pub fn states(&self) -> &[Region] {
        &self.states
    }

    pub fn counties(&self) -> &[Region] {
        &self.counties
    }

    /// Case-insensitive lookup: exact state name, then a state whose name
    /// contains the query, then the same two passes over counties.
    pub fn find_region(&self, name: &str) -> Option<&Region> {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        for set in [&self.states, &self.counties] {
            if let Some(r) = set.iter().find(|r| r.name.to_lowercase() == query) {
                return Some(r);
            }
            if let Some(r) = set.iter().find(|r| r.name.to_lowercase().contains(&query)) {
                return Some(r);
            }
        }
        None
    }
}

impl RegionResolver for RegionCatalog {
    fn resolve(&self, name: &str) -> Result<Region, AnalysisError> {
        self.find_region(name)
            .cloned()
            .ok_or_else(|| AnalysisError::RegionNotFound(name.to_string()))
    }
}

fn property_str<'a>(feature: &'a geojson::Feature, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| feature.property(k).and_then(|v| v.as_str()))
}

fn regions_from_collection(text: &str, kind: RegionKind) -> Result<Vec<Region>, AnalysisError> {
    let collection = match text.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(fc)) => fc,
        Ok(_) => {
            return Err(AnalysisError::Config(
                "region boundaries must be a FeatureCollection".to_string(),
            ));
        }
        Err(e) => {
            return Err(AnalysisError::Config(format!("invalid region GeoJSON: {}", e)));
        }
    };
    Ok(collect_regions(collection, kind))
}

fn collect_regions(collection: FeatureCollection, kind: RegionKind) -> Vec<Region> {
    let name_keys: &[&str] = match kind {
        RegionKind::State => &["state_name", "name", "NAME"],
        RegionKind::County => &["county_name", "name", "NAME"],
    };

    let mut regions = Vec::with_capacity(collection.features.len());
    for (i, feature) in collection.features.into_iter().enumerate() {
        let Some(name) = property_str(&feature, name_keys).map(str::to_string) else {
            tracing::warn!("Region feature {} has no name property, skipping", i);
            continue;
        };
        let state = match kind {
            RegionKind::State => Some(name.clone()),
            RegionKind::County => property_str(&feature, &["state_name", "state"]).map(str::to_string),
        };
        let Some(geom) = feature.geometry else {
            tracing::warn!("Region '{}' has no geometry, skipping", name);
            continue;
        };
        match geometry::parse_region_geometry(geom) {
            Ok(geometry) => regions.push(Region {
                name,
                kind,
                state,
                geometry,
            }),
            Err(reason) => tracing::warn!("Region '{}' has invalid geometry: {}", name, reason),
        }
    }
    regions
}

// ---------------------------------------------------------------------------
// Asset layer availability
// ---------------------------------------------------------------------------

/// Where an asset layer has data.
pub struct AssetLayerInfo {
    pub layer: AssetLayer,
    /// Lowercase state names with coverage; `None` means nationwide.
    pub states: Option<&'static [&'static str]>,
    /// Coverage phrase used in "unavailable" messages.
    pub coverage: &'static str,
    /// Nationwide layers are cut down to the region before classification.
    pub prefilter_to_region: bool,
}

pub static ASSET_LAYER_REGISTRY: &[AssetLayerInfo] = &[
    AssetLayerInfo {
        layer: AssetLayer::PowerInfrastructure,
        states: None,
        coverage: "the contiguous United States",
        prefilter_to_region: true,
    },
    AssetLayerInfo {
        layer: AssetLayer::OilWells,
        states: Some(&["north dakota"]),
        coverage: "North Dakota",
        prefilter_to_region: false,
    },
];

pub fn find_layer(layer: AssetLayer) -> Option<&'static AssetLayerInfo> {
    ASSET_LAYER_REGISTRY.iter().find(|info| info.layer == layer)
}

/// Checks that `layer` has data for `region`. A county is covered when its
/// state is.
pub fn layer_available_for(layer: AssetLayer, region: &Region) -> Result<(), AnalysisError> {
    let Some(info) = find_layer(layer) else {
        return Err(AnalysisError::AssetLayerUnavailable(format!(
            "No {} data is registered.",
            layer
        )));
    };
    let Some(states) = info.states else {
        return Ok(());
    };
    let state = region.state.as_deref().unwrap_or(&region.name).to_lowercase();
    if states.contains(&state.as_str()) {
        Ok(())
    } else {
        Err(AnalysisError::AssetLayerUnavailable(format!(
            "{} data is only available for {}, not for {}",
            capitalize(&layer.to_string()),
            info.coverage,
            region.display_name()
        )))
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
