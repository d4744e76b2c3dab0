//! Geospatial hazard risk engine.
//!
//! Turns gridded forecast cells (wind speed, temperature) into risk
//! classifications, scores, time-grouped events and summaries, optionally
//! intersected with infrastructure assets. `service::HazardService` is the
//! entry point; the `analysis` pipelines can also be driven directly.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod regions;
pub mod render;
pub mod request;
pub mod service;
pub mod sources;

pub use error::AnalysisError;
