//! Feature preparation: classification, synthesis, normalization.
//!
//! Responsibilities:
//!
//! - split raw attributes into observable survivors and excluded columns
//! - derive composite signals from observable inputs only
//! - impute + standardize, freezing the final feature set
//!
//! Every exclusion is a recoverable, recorded decision; nothing in this
//! module is fatal except ending up with no usable features at all.

pub mod classify;
pub mod normalize;
pub mod synthesize;

pub use classify::*;
pub use normalize::*;
pub use synthesize::*;

use crate::domain::FeatureDescriptor;

/// A surviving feature column: descriptor plus per-record optional values.
#[derive(Debug, Clone)]
pub struct FeatureColumn {
    pub descriptor: FeatureDescriptor,
    pub values: Vec<Option<f64>>,
}

/// Why a feature was removed from the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    /// Declared in the schema but never present in any record.
    Schema,
    /// Name matches an outcome-derived pattern.
    Denylist { pattern: String },
    /// |correlation| with the target above the hard threshold.
    Correlation { value: f64 },
    /// Non-missing fraction below the minimum.
    Coverage { fraction: f64 },
    /// Zero variance after imputation.
    Degenerate,
}

impl ExclusionReason {
    /// Short category label for reports.
    pub fn label(&self) -> &'static str {
        match self {
            ExclusionReason::Schema => "schema",
            ExclusionReason::Denylist { .. } => "leakage (name)",
            ExclusionReason::Correlation { .. } => "leakage (correlation)",
            ExclusionReason::Coverage { .. } => "coverage",
            ExclusionReason::Degenerate => "degenerate",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            ExclusionReason::Schema => "declared but never present".to_string(),
            ExclusionReason::Denylist { pattern } => format!("name matches '{pattern}'"),
            ExclusionReason::Correlation { value } => {
                format!("|corr|={:.3} with the target", value.abs())
            }
            ExclusionReason::Coverage { fraction } => {
                format!("only {:.0}% of records covered", fraction * 100.0)
            }
            ExclusionReason::Degenerate => "constant after imputation".to_string(),
        }
    }
}

/// One excluded feature.
#[derive(Debug, Clone)]
pub struct Exclusion {
    pub feature: String,
    pub reason: ExclusionReason,
}

/// A retained feature whose correlation with the target sits in the
/// soft-to-hard band: kept, but possibly a proxy for the outcome.
#[derive(Debug, Clone)]
pub struct ProxyWarning {
    pub feature: String,
    pub correlation: f64,
}

/// Structured record of every exclusion and warning in a run.
#[derive(Debug, Clone, Default)]
pub struct ExclusionReport {
    pub excluded: Vec<Exclusion>,
    pub warnings: Vec<ProxyWarning>,
}

impl ExclusionReport {
    pub fn exclude(&mut self, feature: impl Into<String>, reason: ExclusionReason) {
        self.excluded.push(Exclusion {
            feature: feature.into(),
            reason,
        });
    }

    pub fn warn_proxy(&mut self, feature: impl Into<String>, correlation: f64) {
        self.warnings.push(ProxyWarning {
            feature: feature.into(),
            correlation,
        });
    }
}
