//! Regression model families for the ensemble.
//!
//! Four structurally different families so the blend captures complementary
//! error patterns:
//!
//! - a bagged forest of variance-splitting trees (low variance)
//! - sequentially boosted shallow trees (low bias)
//! - ridge and lasso linear models (stable extrapolation on standardized data)
//!
//! All families consume the same standardized feature matrix and expose a
//! single `predict_row` so training code can treat them uniformly.

pub mod boost;
pub mod forest;
pub mod linear;
pub mod tree;

pub use boost::BoostModel;
pub use forest::ForestModel;
pub use linear::LinearModel;
pub use tree::{RegressionTree, TreeParams};

use crate::domain::{EngineConfig, ModelKind};
use crate::error::AppError;

/// Fitted state for one model family.
#[derive(Debug, Clone)]
pub enum FittedModel {
    Forest(ForestModel),
    Boost(BoostModel),
    Linear(LinearModel),
}

impl FittedModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            FittedModel::Forest(m) => m.predict_row(row),
            FittedModel::Boost(m) => m.predict_row(row),
            FittedModel::Linear(m) => m.predict_row(row),
        }
    }

    /// Normalized impurity-based importances, only available for the forest.
    pub fn feature_importance(&self) -> Option<&[f64]> {
        match self {
            FittedModel::Forest(m) => Some(m.importance()),
            _ => None,
        }
    }
}

/// Fit one family on the given standardized matrix.
///
/// Any failure here (invalid hyperparameters, degenerate input, numerical
/// breakdown) is an error the trainer catches to exclude the family, never a
/// panic.
pub fn fit_family(
    kind: ModelKind,
    x: &[Vec<f64>],
    y: &[f64],
    config: &EngineConfig,
    seed: u64,
) -> Result<FittedModel, AppError> {
    validate_matrix(x, y)?;
    match kind {
        ModelKind::Forest => Ok(FittedModel::Forest(forest::fit(x, y, &config.forest, seed)?)),
        ModelKind::Boost => Ok(FittedModel::Boost(boost::fit(x, y, &config.boost, seed)?)),
        ModelKind::Ridge => Ok(FittedModel::Linear(linear::fit_ridge(
            x,
            y,
            config.ridge_alpha,
        )?)),
        ModelKind::Lasso => Ok(FittedModel::Linear(linear::fit_lasso(
            x,
            y,
            config.lasso_alpha,
        )?)),
    }
}

fn validate_matrix(x: &[Vec<f64>], y: &[f64]) -> Result<(), AppError> {
    if x.is_empty() || y.is_empty() {
        return Err(AppError::new(4, "Empty training matrix."));
    }
    if x.len() != y.len() {
        return Err(AppError::new(
            4,
            format!("Matrix/target length mismatch: {} rows vs {} targets.", x.len(), y.len()),
        ));
    }
    let width = x[0].len();
    if width == 0 {
        return Err(AppError::new(4, "Training matrix has no features."));
    }
    for (i, row) in x.iter().enumerate() {
        if row.len() != width {
            return Err(AppError::new(4, format!("Ragged feature row at index {i}.")));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AppError::new(4, format!("Non-finite feature value at row {i}.")));
        }
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(4, "Non-finite target value."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EngineConfig;

    fn tiny_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (20 - i) as f64]).collect();
        let y: Vec<f64> = (0..20).map(|i| 1.0 + i as f64).collect();
        (x, y)
    }

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::with_csv("unused.csv");
        config.forest.trees = 10;
        config.forest.max_depth = 4;
        config.boost.stages = 20;
        config
    }

    #[test]
    fn every_family_fits_and_predicts_finite_values() {
        let (x, y) = tiny_data();
        let config = small_config();
        for kind in ModelKind::all() {
            let model = fit_family(kind, &x, &y, &config, 7).unwrap();
            let pred = model.predict_row(&x[3]);
            assert!(pred.is_finite(), "{} produced non-finite output", kind.display_name());
        }
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let x = vec![vec![1.0, 2.0], vec![3.0]];
        let y = vec![1.0, 2.0];
        let config = small_config();
        let err = fit_family(ModelKind::Ridge, &x, &y, &config, 7).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn only_the_forest_reports_importance() {
        let (x, y) = tiny_data();
        let config = small_config();
        let forest = fit_family(ModelKind::Forest, &x, &y, &config, 7).unwrap();
        assert!(forest.feature_importance().is_some());
        let ridge = fit_family(ModelKind::Ridge, &x, &y, &config, 7).unwrap();
        assert!(ridge.feature_importance().is_none());
    }
}
