//! Imputation and standardization.
//!
//! For each surviving feature: missing values are imputed with the
//! training-population median, then every value is transformed to
//! `(x - mean) / std` using training-population statistics. The statistics
//! are stored and reused verbatim for any later transform, which is what
//! keeps train-time and inference-time features identical.
//!
//! A feature that is constant after imputation cannot be standardized and is
//! excluded here with a degenerate-feature record. The feature set freezes at
//! the end of this step.

use crate::domain::FeatureSet;
use crate::error::AppError;
use crate::features::{ExclusionReason, ExclusionReport, FeatureColumn};
use crate::math::{mean, median, std_dev};

/// Variance floor below which standardization would be a division by zero.
const MIN_STD: f64 = 1e-9;

/// Stored per-feature statistics, aligned with the frozen feature order.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NormalizerStats {
    pub medians: Vec<f64>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl NormalizerStats {
    /// Transform one raw value for feature `j`; missing values impute to the
    /// stored median first.
    pub fn transform(&self, j: usize, value: Option<f64>) -> f64 {
        let raw = value.unwrap_or(self.medians[j]);
        (raw - self.means[j]) / self.stds[j]
    }
}

/// The frozen feature set with its fully standardized matrix.
#[derive(Debug, Clone)]
pub struct NormalizedMatrix {
    pub feature_set: FeatureSet,
    /// One row per roster record, in roster order.
    pub rows: Vec<Vec<f64>>,
    pub stats: NormalizerStats,
}

/// Impute and standardize the surviving columns.
///
/// `training_mask` marks the rows whose statistics define the transform
/// (rows with a known outcome); all rows are transformed.
pub fn normalize_features(
    columns: &[FeatureColumn],
    training_mask: &[bool],
    report: &mut ExclusionReport,
) -> Result<NormalizedMatrix, AppError> {
    let n = training_mask.len();

    let mut kept: Vec<&FeatureColumn> = Vec::new();
    let mut medians = Vec::new();
    let mut means = Vec::new();
    let mut stds = Vec::new();

    for column in columns {
        let training_values: Vec<f64> = column
            .values
            .iter()
            .zip(training_mask)
            .filter_map(|(v, &is_train)| if is_train { *v } else { None })
            .collect();

        let Some(med) = median(&training_values) else {
            // Present somewhere on the roster but never on a training row;
            // there is no population to learn a transform from.
            report.exclude(column.descriptor.name.clone(), ExclusionReason::Degenerate);
            continue;
        };

        let imputed: Vec<f64> = column
            .values
            .iter()
            .zip(training_mask)
            .filter_map(|(v, &is_train)| is_train.then(|| v.unwrap_or(med)))
            .collect();

        let m = mean(&imputed).unwrap_or(med);
        let sd = std_dev(&imputed).unwrap_or(0.0);
        if sd < MIN_STD {
            report.exclude(column.descriptor.name.clone(), ExclusionReason::Degenerate);
            continue;
        }

        kept.push(column);
        medians.push(med);
        means.push(m);
        stds.push(sd);
    }

    if kept.is_empty() {
        return Err(AppError::new(
            3,
            "No usable features after classification and normalization.",
        ));
    }

    let stats = NormalizerStats {
        medians,
        means,
        stds,
    };

    // Build the matrix in frozen feature order.
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            kept.iter()
                .enumerate()
                .map(|(j, col)| stats.transform(j, col.values[i]))
                .collect()
        })
        .collect();

    let descriptors = kept.iter().map(|c| c.descriptor.clone()).collect();

    Ok(NormalizedMatrix {
        feature_set: FeatureSet { descriptors },
        rows,
        stats,
    })
}
