//! Cross-validated training of the model families.
//!
//! Every (family, fold) pair is an independent unit: it trains on the other
//! folds and records the held-out mean absolute error. Units run in parallel
//! under rayon; the reduction afterwards walks families and folds in declared
//! order, so the outcome does not depend on scheduling. Unit RNG seeds derive
//! from the run seed plus the unit's identity, never from a shared stream.
//!
//! A family that fails any unit (or the final refit) is excluded with the
//! failure recorded; siblings are unaffected. Training only aborts when no
//! family survives.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::domain::{CvResult, EngineConfig, ModelKind};
use crate::error::AppError;
use crate::math::{mean, std_dev};
use crate::models::{fit_family, FittedModel};

/// Everything the combiner needs from training.
#[derive(Debug)]
pub struct TrainOutcome {
    pub cv: Vec<CvResult>,
    pub fitted: Vec<(ModelKind, FittedModel)>,
    pub skipped: Vec<(ModelKind, String)>,
}

/// Assign each of `n` rows to one of `folds` folds, balanced and shuffled.
pub fn fold_assignments(n: usize, folds: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut assignment = vec![0; n];
    for (position, &row) in order.iter().enumerate() {
        assignment[row] = position % folds;
    }
    assignment
}

/// Shuffle rows into a training part and a held-out evaluation part.
///
/// A fraction of zero returns every row as training and an empty test set
/// (the caller then evaluates in-sample).
pub fn split_train_test(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));
    order.shuffle(&mut rng);

    if test_fraction <= 0.0 || n < 2 {
        return (order, Vec::new());
    }
    let test_n = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
    let test = order[..test_n].to_vec();
    let train = order[test_n..].to_vec();
    (train, test)
}

/// Cross-validate and refit every configured family.
///
/// The fold count is clamped to the number of training rows so tiny synthetic
/// rosters still validate (leave-one-out at the extreme).
pub fn train_families(
    x: &[Vec<f64>],
    y: &[f64],
    config: &EngineConfig,
) -> Result<TrainOutcome, AppError> {
    let n = x.len();
    if n < 2 {
        return Err(AppError::new(
            3,
            format!("Need at least 2 training rows, have {n}."),
        ));
    }
    let folds = config.folds.clamp(2, n);
    let assignment = fold_assignments(n, folds, config.seed);

    let kinds = config.model_spec.kinds();
    let units: Vec<(usize, usize)> = kinds
        .iter()
        .enumerate()
        .flat_map(|(ki, _)| (0..folds).map(move |fold| (ki, fold)))
        .collect();

    // Parallel map, then a deterministic ordered reduction below. The
    // collect preserves unit order, so unit (ki, fold) sits at ki*folds+fold.
    let fold_errors: Vec<Result<f64, AppError>> = units
        .par_iter()
        .map(|&(ki, fold)| run_fold(kinds[ki], x, y, &assignment, fold, config))
        .collect();

    let mut cv = Vec::new();
    let mut skipped: Vec<(ModelKind, String)> = Vec::new();

    for (ki, &kind) in kinds.iter().enumerate() {
        let mut errors = Vec::with_capacity(folds);
        let mut failure: Option<String> = None;
        for fold in 0..folds {
            let result = &fold_errors[ki * folds + fold];
            match result {
                Ok(err) => errors.push(*err),
                Err(e) => {
                    failure.get_or_insert_with(|| format!("fold {fold}: {e}"));
                }
            }
        }
        if let Some(reason) = failure {
            skipped.push((kind, reason));
            continue;
        }
        cv.push(CvResult {
            model: kind,
            mean_mae: mean(&errors).unwrap_or(f64::INFINITY),
            std_mae: std_dev(&errors).unwrap_or(0.0),
            fold_errors: errors,
        });
    }

    // Refit survivors on the entire training population.
    let refits: Vec<(ModelKind, Result<FittedModel, AppError>)> = cv
        .par_iter()
        .map(|r| {
            let seed = unit_seed(config.seed, r.model, usize::MAX);
            (r.model, fit_family(r.model, x, y, config, seed))
        })
        .collect();

    let mut fitted = Vec::new();
    let mut surviving_cv = Vec::new();
    for ((kind, result), cv_result) in refits.into_iter().zip(cv.into_iter()) {
        match result {
            Ok(model) => {
                fitted.push((kind, model));
                surviving_cv.push(cv_result);
            }
            Err(e) => skipped.push((kind, format!("refit: {e}"))),
        }
    }

    if fitted.is_empty() {
        let detail: Vec<String> = skipped
            .iter()
            .map(|(kind, reason)| format!("{}: {reason}", kind.display_name()))
            .collect();
        return Err(AppError::new(
            3,
            format!("Every model family failed to train ({}).", detail.join("; ")),
        ));
    }

    Ok(TrainOutcome {
        cv: surviving_cv,
        fitted,
        skipped,
    })
}

fn run_fold(
    kind: ModelKind,
    x: &[Vec<f64>],
    y: &[f64],
    assignment: &[usize],
    fold: usize,
    config: &EngineConfig,
) -> Result<f64, AppError> {
    let mut train_x = Vec::new();
    let mut train_y = Vec::new();
    let mut held_x = Vec::new();
    let mut held_y = Vec::new();
    for i in 0..x.len() {
        if assignment[i] == fold {
            held_x.push(x[i].clone());
            held_y.push(y[i]);
        } else {
            train_x.push(x[i].clone());
            train_y.push(y[i]);
        }
    }
    if held_x.is_empty() || train_x.is_empty() {
        return Err(AppError::new(4, format!("Fold {fold} has an empty side.")));
    }

    let model = fit_family(kind, &train_x, &train_y, config, unit_seed(config.seed, kind, fold))?;
    let abs_sum: f64 = held_x
        .iter()
        .zip(&held_y)
        .map(|(row, actual)| (model.predict_row(row) - actual).abs())
        .sum();
    Ok(abs_sum / held_y.len() as f64)
}

/// Stable per-unit seed derived from the run seed and the unit identity.
fn unit_seed(seed: u64, kind: ModelKind, fold: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    kind.display_name().hash(&mut hasher);
    fold.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelSelection;

    fn synthetic(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        // Two informative features with seeded Gaussian noise.
        let mut rng = StdRng::seed_from_u64(17);
        let normal = rand_distr::Normal::new(0.0, 0.5).unwrap();
        let x: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![i as f64, normal.sample(&mut rng)])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 1.0 + 0.8 * r[0] + 0.1 * r[1]).collect();
        (x, y)
    }

    fn fast_config() -> EngineConfig {
        let mut config = EngineConfig::with_csv("unused.csv");
        config.forest.trees = 12;
        config.forest.max_depth = 5;
        config.boost.stages = 25;
        config.folds = 4;
        config
    }

    #[test]
    fn fold_assignments_are_balanced_and_complete() {
        let assignment = fold_assignments(23, 5, 42);
        assert_eq!(assignment.len(), 23);
        let mut counts = [0usize; 5];
        for &f in &assignment {
            counts[f] += 1;
        }
        assert!(counts.iter().all(|&c| c == 4 || c == 5));
    }

    #[test]
    fn split_respects_fraction_and_keeps_both_sides_nonempty() {
        let (train, test) = split_train_test(50, 0.2, 42);
        assert_eq!(test.len(), 10);
        assert_eq!(train.len(), 40);

        let (train, test) = split_train_test(50, 0.0, 42);
        assert_eq!(test.len(), 0);
        assert_eq!(train.len(), 50);
    }

    #[test]
    fn training_produces_cv_for_every_family() {
        let (x, y) = synthetic(40);
        let outcome = train_families(&x, &y, &fast_config()).unwrap();
        assert_eq!(outcome.cv.len(), 4);
        assert_eq!(outcome.fitted.len(), 4);
        assert!(outcome.skipped.is_empty());
        for result in &outcome.cv {
            assert_eq!(result.fold_errors.len(), 4);
            assert!(result.mean_mae.is_finite());
        }
    }

    #[test]
    fn one_broken_family_is_skipped_not_fatal() {
        let (x, y) = synthetic(40);
        let mut config = fast_config();
        config.boost.learning_rate = -1.0; // invalid: the family must fail to fit

        let outcome = train_families(&x, &y, &config).unwrap();
        assert_eq!(outcome.fitted.len(), 3);
        assert!(outcome
            .skipped
            .iter()
            .any(|(kind, _)| *kind == ModelKind::Boost));
        assert!(outcome.cv.iter().all(|r| r.model != ModelKind::Boost));
    }

    #[test]
    fn all_families_failing_is_fatal() {
        let (x, y) = synthetic(40);
        let mut config = fast_config();
        config.model_spec = ModelSelection::Boost;
        config.boost.stages = 0;

        let err = train_families(&x, &y, &config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn training_is_deterministic_per_seed() {
        let (x, y) = synthetic(40);
        let config = fast_config();
        let a = train_families(&x, &y, &config).unwrap();
        let b = train_families(&x, &y, &config).unwrap();

        for (ra, rb) in a.cv.iter().zip(&b.cv) {
            assert_eq!(ra.model, rb.model);
            assert_eq!(ra.fold_errors, rb.fold_errors);
        }
        for ((_, ma), (_, mb)) in a.fitted.iter().zip(&b.fitted) {
            for row in &x {
                assert_eq!(ma.predict_row(row), mb.predict_row(row));
            }
        }
    }

    #[test]
    fn tiny_rosters_clamp_the_fold_count() {
        let (x, y) = synthetic(3);
        let mut config = fast_config();
        config.model_spec = ModelSelection::Ridge;
        config.folds = 5; // more folds than rows

        let outcome = train_families(&x, &y, &config).unwrap();
        assert_eq!(outcome.cv[0].fold_errors.len(), 3);
    }
}
