//! Gradient boosting with shallow trees and row subsampling.
//!
//! Squared-error boosting: each stage fits a small tree to the current
//! residuals on a subsampled set of rows, and the model adds the tree scaled
//! by the learning rate. Stages are inherently sequential; determinism comes
//! from deriving the subsample RNG from the run seed and stage index.

use rand::prelude::*;
use rand::rngs::StdRng;

use crate::domain::BoostParams;
use crate::error::AppError;
use crate::models::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone)]
pub struct BoostModel {
    base: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

pub fn fit(
    x: &[Vec<f64>],
    y: &[f64],
    params: &BoostParams,
    seed: u64,
) -> Result<BoostModel, AppError> {
    if params.stages == 0 {
        return Err(AppError::new(4, "Boosting needs at least one stage."));
    }
    if !(params.learning_rate.is_finite() && params.learning_rate > 0.0 && params.learning_rate <= 1.0) {
        return Err(AppError::new(
            4,
            format!("Invalid boosting learning rate {}.", params.learning_rate),
        ));
    }
    if !(params.subsample.is_finite() && params.subsample > 0.0 && params.subsample <= 1.0) {
        return Err(AppError::new(
            4,
            format!("Invalid boosting subsample rate {}.", params.subsample),
        ));
    }

    let n = x.len();
    let base = y.iter().sum::<f64>() / n as f64;
    let tree_params = TreeParams {
        max_depth: params.max_depth,
        min_samples_split: 2,
        min_samples_leaf: 1,
    };

    let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
    let mut current: Vec<f64> = vec![base; n];
    let mut trees = Vec::with_capacity(params.stages);

    for stage in 0..params.stages {
        let residuals: Vec<f64> = y.iter().zip(&current).map(|(yi, f)| yi - f).collect();

        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(stage as u64));
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let mut sample = order[..sample_size].to_vec();
        sample.sort_unstable(); // stable tree input regardless of shuffle order

        let tree = RegressionTree::fit(x, &residuals, &sample, &tree_params)?;
        for (i, f) in current.iter_mut().enumerate() {
            *f += params.learning_rate * tree.predict_row(&x[i]);
        }
        trees.push(tree);
    }

    Ok(BoostModel {
        base,
        learning_rate: params.learning_rate,
        trees,
    })
}

impl BoostModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut value = self.base;
        for tree in &self.trees {
            value += self.learning_rate * tree.predict_row(row);
        }
        value
    }

    pub fn stage_count(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(stages: usize) -> BoostParams {
        BoostParams {
            stages,
            max_depth: 3,
            learning_rate: 0.1,
            subsample: 1.0,
        }
    }

    #[test]
    fn boosting_reduces_residuals_over_stages() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..30).map(|i| 2.0 * i as f64 + 1.0).collect();

        let weak = fit(&x, &y, &params(3), 9).unwrap();
        let strong = fit(&x, &y, &params(80), 9).unwrap();

        let err = |m: &BoostModel| -> f64 {
            x.iter()
                .zip(&y)
                .map(|(row, yi)| (m.predict_row(row) - yi).abs())
                .sum::<f64>()
                / y.len() as f64
        };
        assert!(err(&strong) < err(&weak) / 2.0);
    }

    #[test]
    fn single_stage_predicts_near_the_mean_plus_one_step() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y = vec![4.0; 10];
        let model = fit(&x, &y, &params(1), 9).unwrap();
        assert!((model.predict_row(&[5.0]) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_learning_rate_is_an_error() {
        let x = vec![vec![1.0], vec![2.0]];
        let y = vec![1.0, 2.0];
        let mut p = params(5);
        p.learning_rate = -0.5;
        let err = fit(&x, &y, &p, 9).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn subsampled_fit_is_deterministic_per_seed() {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| (i % 7) as f64).collect();
        let mut p = params(15);
        p.subsample = 0.6;

        let a = fit(&x, &y, &p, 21).unwrap();
        let b = fit(&x, &y, &p, 21).unwrap();
        for i in 0..40 {
            assert_eq!(a.predict_row(&[i as f64]), b.predict_row(&[i as f64]));
        }
    }
}
