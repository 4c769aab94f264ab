//! Training orchestration.
//!
//! Responsibilities:
//!
//! - seeded shuffling into folds and the held-out evaluation split
//! - cross-validating each model family (parallel units, ordered reduction)
//! - combining survivors into a performance-weighted ensemble

pub mod cv;
pub mod ensemble;

pub use cv::*;
pub use ensemble::*;
