//! Input/output: roster ingest and artifact writers.

pub mod export;
pub mod ingest;
pub mod summary;
