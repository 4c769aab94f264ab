//! Descriptive statistics shared by the classifier, normalizer and evaluator.
//!
//! Everything here operates on plain `f64` slices and returns `None` when the
//! quantity is undefined (empty input, zero variance, mismatched lengths), so
//! callers decide whether that is a recoverable exclusion or a hard error.

/// Arithmetic mean. `None` on empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance. `None` on empty input.
pub fn variance(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    Some(values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64)
}

/// Population standard deviation. `None` on empty input.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Median of a sample (average of middle pair for even counts).
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Pearson correlation coefficient.
///
/// `None` when fewer than two pairs are available or either side has zero
/// variance (the coefficient is undefined, not zero, in that case).
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..x.len() {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some(cov / (var_x * var_y).sqrt())
}

/// Spearman rank correlation: Pearson over average-ranked values.
///
/// Ties receive the average of the ranks they span, so repeated predictions
/// do not bias the coefficient.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let rx = average_ranks(x);
    let ry = average_ranks(y);
    pearson(&rx, &ry)
}

/// Coefficient of determination of `predicted` against `actual`.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return None;
    }
    let mean_a = mean(actual)?;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_a) * (a - mean_a)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    if ss_tot <= 0.0 {
        return None;
    }
    Some(1.0 - ss_res / ss_tot)
}

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return None;
    }
    Some(
        actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| (a - p).abs())
            .sum::<f64>()
            / actual.len() as f64,
    )
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return None;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum::<f64>()
        / actual.len() as f64;
    Some(mse.sqrt())
}

/// Rank each value ascending, assigning tied values the average of the ranks
/// they occupy (1-based).
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Ranks i+1 ..= j+1 share the same value.
        let avg = (i + 1 + j + 1) as f64 / 2.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn pearson_of_linear_data_is_one() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        let r = pearson(&x, &y).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_of_constant_is_undefined() {
        let x = [1.0, 1.0, 1.0];
        let y = [2.0, 4.0, 6.0];
        assert!(pearson(&x, &y).is_none());
    }

    #[test]
    fn spearman_is_one_for_any_monotone_map() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 8.0, 27.0, 64.0, 125.0]; // nonlinear but monotone
        let rho = spearman(&x, &y).unwrap();
        assert!((rho - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spearman_is_minus_one_for_reversed_order() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [10.0, 8.0, 5.0, 1.0];
        let rho = spearman(&x, &y).unwrap();
        assert!((rho + 1.0).abs() < 1e-12);
    }

    #[test]
    fn average_ranks_split_ties() {
        let ranks = average_ranks(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn r_squared_perfect_prediction() {
        let actual = [1.0, 2.0, 3.0];
        assert!((r_squared(&actual, &actual).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn error_metrics_on_known_values() {
        let actual = [1.0, 2.0, 3.0];
        let predicted = [2.0, 2.0, 5.0];
        assert!((mae(&actual, &predicted).unwrap() - 1.0).abs() < 1e-12);
        let expected_rmse = ((1.0 + 0.0 + 4.0f64) / 3.0).sqrt();
        assert!((rmse(&actual, &predicted).unwrap() - expected_rmse).abs() < 1e-12);
    }
}
