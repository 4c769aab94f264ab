//! Regularized linear families: ridge (L2) and lasso (L1).
//!
//! Both expect standardized features, center the target internally and
//! recover the intercept as the target mean. Ridge is a direct augmented
//! least-squares solve; lasso is cyclic coordinate descent with the usual
//! `(1/2n) * SSE + alpha * L1` objective so the alpha scale matches common
//! ML tooling.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::solve_ridge;

const LASSO_MAX_SWEEPS: usize = 2000;
const LASSO_TOL: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct LinearModel {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let dot: f64 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(c, v)| c * v)
            .sum();
        self.intercept + dot
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

pub fn fit_ridge(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<LinearModel, AppError> {
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(AppError::new(4, format!("Invalid ridge alpha {alpha}.")));
    }
    let n = x.len();
    let p = x[0].len();
    let intercept = y.iter().sum::<f64>() / n as f64;

    let design = DMatrix::from_fn(n, p, |i, j| x[i][j]);
    let centered = DVector::from_fn(n, |i, _| y[i] - intercept);

    let beta = solve_ridge(&design, &centered, alpha)
        .ok_or_else(|| AppError::new(4, "Ridge system too ill-conditioned to solve."))?;

    Ok(LinearModel {
        intercept,
        coefficients: beta.iter().copied().collect(),
    })
}

pub fn fit_lasso(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<LinearModel, AppError> {
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(AppError::new(4, format!("Invalid lasso alpha {alpha}.")));
    }
    let n = x.len();
    let p = x[0].len();
    let n_f = n as f64;
    let intercept = y.iter().sum::<f64>() / n_f;

    // Per-feature second moments; a dead column keeps a zero coefficient.
    let mut col_sq = vec![0.0; p];
    for row in x {
        for (j, v) in row.iter().enumerate() {
            col_sq[j] += v * v;
        }
    }
    for v in &mut col_sq {
        *v /= n_f;
    }

    let mut beta = vec![0.0; p];
    let mut residual: Vec<f64> = y.iter().map(|yi| yi - intercept).collect();

    for _ in 0..LASSO_MAX_SWEEPS {
        let mut max_delta: f64 = 0.0;
        for j in 0..p {
            if col_sq[j] <= 0.0 {
                continue;
            }
            // rho = (1/n) * <x_j, residual + x_j * beta_j>
            let mut rho = 0.0;
            for i in 0..n {
                rho += x[i][j] * (residual[i] + x[i][j] * beta[j]);
            }
            rho /= n_f;

            let updated = soft_threshold(rho, alpha) / col_sq[j];
            let delta = updated - beta[j];
            if delta != 0.0 {
                for i in 0..n {
                    residual[i] -= delta * x[i][j];
                }
                beta[j] = updated;
                max_delta = max_delta.max(delta.abs());
            }
        }
        if max_delta < LASSO_TOL {
            break;
        }
    }

    if beta.iter().any(|b| !b.is_finite()) {
        return Err(AppError::new(4, "Lasso coordinate descent diverged."));
    }

    Ok(LinearModel {
        intercept,
        coefficients: beta,
    })
}

fn soft_threshold(z: f64, gamma: f64) -> f64 {
    if z > gamma {
        z - gamma
    } else if z < -gamma {
        z + gamma
    } else {
        0.0
    }
}
