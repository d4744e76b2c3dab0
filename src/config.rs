//! Engine configuration.
//!
//! Parsed from a TOML file whose sections all have defaults, so an empty
//! file (or no file at all) yields the stock thresholds:
//!
//! ```toml
//! [wind]
//! moderate_threshold_ms = 13.0
//! high_threshold_ms = 16.0
//!
//! [assets]
//! impact_buffer_m = 500.0
//! ```
//!
//! `EngineConfig::from_env` loads `.env` first, then reads the config path
//! from `HAZARD_ENGINE_CONFIG` and an optional log filter override from
//! `HAZARD_ENGINE_LOG`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::geometry::WebMercator;
use crate::model::{AssetLayer, RiskThresholds};

pub const CONFIG_PATH_ENV: &str = "HAZARD_ENGINE_CONFIG";
pub const LOG_FILTER_ENV: &str = "HAZARD_ENGINE_LOG";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub wind: WindConfig,
    pub temperature: TemperatureConfig,
    pub assets: AssetConfig,
    pub sampling: SamplingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    pub moderate_threshold_ms: f64,
    pub high_threshold_ms: f64,
    /// Forecast window used when a request does not name one.
    pub forecast_days: i64,
    /// Requests asking for a longer window are clamped to this.
    pub max_forecast_days: i64,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            moderate_threshold_ms: 13.0,
            high_threshold_ms: 16.0,
            forecast_days: 3,
            max_forecast_days: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub min_temp_f: f64,
    pub max_temp_f: f64,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            min_temp_f: 20.0,
            max_temp_f: 95.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Buffer radius around each asset for the wind impact join.
    pub impact_buffer_m: f64,
    /// Buffer radius used to pre-filter assets to a region.
    pub region_prefilter_buffer_m: f64,
    /// Vertices used to approximate a buffer circle.
    pub buffer_segments: usize,
    /// Placeholder length credited per qualifying cell when the asset
    /// intersection succeeds. An estimate, not a line-length measurement.
    pub affected_km_per_cell: f64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            impact_buffer_m: 500.0,
            region_prefilter_buffer_m: 2_000.0,
            buffer_segments: 32,
            affected_km_per_cell: 0.25,
        }
    }
}

/// Display caps for the temperature variant. Caps bound rendering cost
/// only; counts in results are never capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub well_display_cap: usize,
    pub well_sample_target: usize,
    pub power_display_cap: usize,
    pub power_sample_target: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            well_display_cap: 50,
            well_sample_target: 20,
            power_display_cap: 100,
            power_sample_target: 50,
        }
    }
}

/// Cap and stride target for one asset layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingProfile {
    pub display_cap: usize,
    pub sample_target: usize,
}

impl SamplingConfig {
    pub fn profile_for(&self, layer: AssetLayer) -> SamplingProfile {
        match layer {
            AssetLayer::OilWells => SamplingProfile {
                display_cap: self.well_display_cap,
                sample_target: self.well_sample_target,
            },
            AssetLayer::PowerInfrastructure => SamplingProfile {
                display_cap: self.power_display_cap,
                sample_target: self.power_sample_target,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hazard_engine=info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, AnalysisError> {
        let config: EngineConfig = toml::from_str(text)
            .map_err(|e| AnalysisError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `.env`, then the file named by `HAZARD_ENGINE_CONFIG` if set,
    /// falling back to defaults.
    pub fn from_env() -> Result<Self, AnalysisError> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            config.logging.filter = filter;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        RiskThresholds::new(self.wind.moderate_threshold_ms, self.wind.high_threshold_ms)
            .map_err(|e| AnalysisError::Config(e.to_string()))?;

        if self.wind.forecast_days < 1 || self.wind.max_forecast_days < self.wind.forecast_days {
            return Err(AnalysisError::Config(format!(
                "forecast_days {} must be between 1 and max_forecast_days {}",
                self.wind.forecast_days, self.wind.max_forecast_days
            )));
        }
        if !(self.temperature.min_temp_f.is_finite() && self.temperature.max_temp_f.is_finite()) {
            return Err(AnalysisError::Config("temperature thresholds must be finite".into()));
        }
        for (name, radius) in [
            ("impact_buffer_m", self.assets.impact_buffer_m),
            ("region_prefilter_buffer_m", self.assets.region_prefilter_buffer_m),
        ] {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(AnalysisError::Config(format!(
                    "{} must be a positive distance, got {}",
                    name, radius
                )));
            }
        }
        if self.assets.buffer_segments < 3 {
            return Err(AnalysisError::Config(
                "buffer_segments must be at least 3".into(),
            ));
        }
        if self.assets.affected_km_per_cell < 0.0 {
            return Err(AnalysisError::Config(
                "affected_km_per_cell cannot be negative".into(),
            ));
        }
        Ok(())
    }

    /// Projection provider whose buffer circles use `assets.buffer_segments`.
    pub fn geometry_provider(&self) -> WebMercator {
        WebMercator::with_segments(self.assets.buffer_segments)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.wind.moderate_threshold_ms, 13.0);
        assert_eq!(config.wind.high_threshold_ms, 16.0);
        assert_eq!(config.assets.impact_buffer_m, 500.0);
        assert_eq!(config.assets.region_prefilter_buffer_m, 2_000.0);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            "[wind]\nhigh_threshold_ms = 20.0\n\n[sampling]\nwell_sample_target = 10\n",
        )
        .expect("partial config is valid");
        assert_eq!(config.wind.high_threshold_ms, 20.0);
        assert_eq!(config.wind.moderate_threshold_ms, 13.0);
        assert_eq!(config.sampling.well_sample_target, 10);
        assert_eq!(config.sampling.well_display_cap, 50);
    }

    #[test]
    fn test_inverted_wind_thresholds_are_rejected() {
        let result = EngineConfig::from_toml_str(
            "[wind]\nmoderate_threshold_ms = 18.0\nhigh_threshold_ms = 12.0\n",
        );
        assert!(matches!(result, Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_non_positive_buffer_is_rejected() {
        let result = EngineConfig::from_toml_str("[assets]\nimpact_buffer_m = 0.0\n");
        assert!(matches!(result, Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[temperature]\nmin_temp_f = 10.0").expect("write config");
        let config = EngineConfig::load(file.path()).expect("config loads");
        assert_eq!(config.temperature.min_temp_f, 10.0);
        assert_eq!(config.temperature.max_temp_f, 95.0);
    }

    #[test]
    fn test_from_env_reads_config_path_and_log_override() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[wind]\nhigh_threshold_ms = 21.0\n\n[logging]\nfilter = \"hazard_engine=warn\"\njson = true"
        )
        .expect("write config");

        // SAFETY: no other test reads or writes these variables.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, file.path());
            std::env::set_var(LOG_FILTER_ENV, "hazard_engine=trace");
        }
        let result = EngineConfig::from_env();
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
            std::env::remove_var(LOG_FILTER_ENV);
        }

        let config = result.expect("config loads from env");
        assert_eq!(config.wind.high_threshold_ms, 21.0);
        assert_eq!(config.wind.moderate_threshold_ms, 13.0);
        assert!(config.logging.json, "file values survive the override");
        assert_eq!(config.logging.filter, "hazard_engine=trace");
    }

    #[test]
    fn test_buffer_segments_reach_the_provider() {
        let config = EngineConfig::from_toml_str("[assets]\nbuffer_segments = 12\n").expect("valid config");
        assert_eq!(config.geometry_provider().segments, 12);
        assert_eq!(EngineConfig::default().geometry_provider(), WebMercator::default());
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let result = EngineConfig::load(Path::new("/nonexistent/hazard_engine.toml"));
        assert!(matches!(result, Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_sampling_profile_per_layer() {
        let sampling = SamplingConfig::default();
        assert_eq!(
            sampling.profile_for(AssetLayer::OilWells),
            SamplingProfile { display_cap: 50, sample_target: 20 }
        );
        assert_eq!(
            sampling.profile_for(AssetLayer::PowerInfrastructure),
            SamplingProfile { display_cap: 100, sample_target: 50 }
        );
    }
}
