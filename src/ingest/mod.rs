//! Ingest: turning raw collaborator rows into typed cells and assets.
//!
//! - `forecast`: weather-grid rows → `ForecastCell`, time windows, region filter
//! - `assets`: asset rows → `AssetPoint`, region pre-filter

pub mod assets;
pub mod forecast;
