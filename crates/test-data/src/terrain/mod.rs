//! Synthetic terrain for generated tracks.

mod elevation;

pub use elevation::ElevationGenerator;
