//! Least-squares solvers for the regularized linear families.
//!
//! The linear members of the ensemble reduce to small dense problems:
//! the roster rarely exceeds a few hundred rows and a few dozen standardized
//! features, so direct solves are both fast and numerically transparent.
//!
//! Implementation choices:
//! - We use SVD rather than QR so that tall design matrices and nearly
//!   collinear columns (derived signals often correlate with their inputs)
//!   still produce a usable solution.
//! - Ridge is expressed as an augmented ordinary problem: stacking
//!   `sqrt(alpha) * I` below the design matrix penalizes coefficient norm
//!   without a separate solver path.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if the strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `min ||y - X b||^2 + alpha * ||b||^2` via the augmented system.
///
/// The intercept is not part of this problem; callers center `y` first and
/// recover the intercept as the target mean.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Option<DVector<f64>> {
    let n = x.nrows();
    let p = x.ncols();
    if p == 0 || n == 0 || !alpha.is_finite() || alpha < 0.0 {
        return None;
    }

    let mut augmented = DMatrix::<f64>::zeros(n + p, p);
    let mut rhs = DVector::<f64>::zeros(n + p);

    augmented.view_mut((0, 0), (n, p)).copy_from(x);
    rhs.rows_mut(0, n).copy_from(y);

    let root = alpha.sqrt();
    for j in 0..p {
        augmented[(n + j, j)] = root;
        // rhs stays zero for the penalty rows.
    }

    solve_least_squares(&augmented, &rhs)
}
