//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration (`EngineConfig`, `ModelSelection`, `TierSpec`)
//! - roster records and feature descriptors (`ProspectRecord`, `FeatureDescriptor`)
//! - training outputs (`CvResult`, `EnsembleWeights`, `PredictionRecord`)

pub mod types;

pub use types::*;
