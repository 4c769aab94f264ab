//! Bootstrap-bagged forest of regression trees.
//!
//! Each tree sees a bootstrap resample of the training rows; the prediction
//! is the plain average over trees. Tree seeds derive from the run seed plus
//! the tree index, so the whole forest is reproducible and trees can be grown
//! in parallel without coordination.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::domain::ForestParams;
use crate::error::AppError;
use crate::models::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone)]
pub struct ForestModel {
    trees: Vec<RegressionTree>,
    importance: Vec<f64>,
}

pub fn fit(
    x: &[Vec<f64>],
    y: &[f64],
    params: &ForestParams,
    seed: u64,
) -> Result<ForestModel, AppError> {
    if params.trees == 0 {
        return Err(AppError::new(4, "Forest needs at least one tree."));
    }
    let tree_params = TreeParams {
        max_depth: params.max_depth,
        min_samples_split: params.min_samples_split,
        min_samples_leaf: params.min_samples_leaf,
    };

    let n = x.len();
    let trees: Vec<RegressionTree> = (0..params.trees)
        .into_par_iter()
        .map(|t| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            RegressionTree::fit(x, y, &sample, &tree_params)
        })
        .collect::<Result<_, _>>()?;

    let n_features = x[0].len();
    let mut importance = vec![0.0; n_features];
    for tree in &trees {
        for (j, g) in tree.gains().iter().enumerate() {
            importance[j] += g;
        }
    }
    let total: f64 = importance.iter().sum();
    if total > 0.0 {
        for v in &mut importance {
            *v /= total;
        }
    }

    Ok(ForestModel { trees, importance })
}

impl ForestModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Importance shares, normalized to sum to 1 (all zeros when no split
    /// ever fired, e.g. constant targets).
    pub fn importance(&self) -> &[f64] {
        &self.importance
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}
