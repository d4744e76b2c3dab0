//! Hazard analysis stages.
//!
//! Wind pipeline, in order:
//! - `thresholds`: label cells Moderate / High (or Unsafe for temperature)
//! - `impact`: optional asset buffer + spatial join, with typed fallbacks
//! - `scoring`: normalize each cell to a 0–100 score
//! - `events`: partition cells into per-timestamp events
//! - `summary`: roll events into one report
//!
//! `wind` wires those together; `zones` is the single-threshold
//! temperature variant that classifies point assets against unsafe zones.

pub mod events;
pub mod impact;
pub mod scoring;
pub mod summary;
pub mod thresholds;
pub mod wind;
pub mod zones;
