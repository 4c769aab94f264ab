//! Performance-weighted ensemble over the surviving model families.
//!
//! Weights are inverse cross-validation error, normalized over whatever
//! survived training: excluding a family renormalizes the rest automatically
//! because the formula never mentions the excluded one. Identical errors get
//! identical weights; no tie-breaking is needed.

use crate::domain::{CvResult, EnsembleWeights, FeatureSet, ModelKind};
use crate::error::AppError;
use crate::features::NormalizerStats;
use crate::models::FittedModel;
use crate::train::TrainOutcome;

/// Floor so a near-zero CV error cannot produce an infinite weight.
const MIN_CV_ERROR: f64 = 1e-6;

/// The immutable artifact of the fit phase.
///
/// Everything prediction needs lives here: the frozen feature set, the
/// normalizer statistics, each family's fitted state and its weight. The
/// evaluate/predict phase only reads this value.
#[derive(Debug)]
pub struct TrainedEnsemble {
    pub feature_set: FeatureSet,
    pub normalizer: NormalizerStats,
    pub models: Vec<(ModelKind, FittedModel)>,
    pub weights: EnsembleWeights,
    pub cv: Vec<CvResult>,
    pub skipped: Vec<(ModelKind, String)>,
    /// Upper clip bound: the roster size N. Predictions live in `[1, N]`.
    pub clip_max: f64,
}

/// Combine a training outcome into a weighted ensemble.
pub fn build_ensemble(
    outcome: TrainOutcome,
    feature_set: FeatureSet,
    normalizer: NormalizerStats,
    clip_max: f64,
) -> Result<TrainedEnsemble, AppError> {
    if !(clip_max.is_finite() && clip_max >= 1.0) {
        return Err(AppError::new(2, format!("Invalid roster size bound {clip_max}.")));
    }

    let mut raw = Vec::with_capacity(outcome.fitted.len());
    for (kind, _) in &outcome.fitted {
        let cv = outcome
            .cv
            .iter()
            .find(|r| r.model == *kind)
            .ok_or_else(|| {
                AppError::new(4, format!("Missing CV result for {}.", kind.display_name()))
            })?;
        raw.push((*kind, 1.0 / cv.mean_mae.max(MIN_CV_ERROR)));
    }

    let total: f64 = raw.iter().map(|(_, w)| w).sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(AppError::new(4, "Degenerate ensemble weight normalization."));
    }
    let entries = raw.into_iter().map(|(kind, w)| (kind, w / total)).collect();

    Ok(TrainedEnsemble {
        feature_set,
        normalizer,
        models: outcome.fitted,
        weights: EnsembleWeights { entries },
        cv: outcome.cv,
        skipped: outcome.skipped,
        clip_max,
    })
}

impl TrainedEnsemble {
    /// Blend one standardized row into a final rank prediction.
    ///
    /// Sub-predictions and the blend are all clipped to `[1, N]`: an ordinal
    /// rank outside the roster is meaningless.
    pub fn predict_row(&self, features: &[f64]) -> (f64, Vec<(ModelKind, f64)>) {
        let by_model: Vec<(ModelKind, f64)> = self
            .models
            .iter()
            .map(|(kind, model)| (*kind, model.predict_row(features).clamp(1.0, self.clip_max)))
            .collect();

        let blended: f64 = by_model
            .iter()
            .map(|(kind, pred)| self.weights.get(*kind).unwrap_or(0.0) * pred)
            .sum();

        (blended.clamp(1.0, self.clip_max), by_model)
    }

    /// Feature importances from the bagged forest, when it survived.
    pub fn forest_importance(&self) -> Option<&[f64]> {
        self.models
            .iter()
            .find(|(kind, _)| *kind == ModelKind::Forest)
            .and_then(|(_, model)| model.feature_importance())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EngineConfig, FeatureDescriptor, ModelSelection, Provenance};
    use crate::train::train_families;

    fn feature_set(n: usize) -> FeatureSet {
        FeatureSet {
            descriptors: (0..n)
                .map(|i| FeatureDescriptor {
                    name: format!("f{i}"),
                    provenance: Provenance::Observable,
                    coverage: 1.0,
                })
                .collect(),
        }
    }

    fn stats(n: usize) -> NormalizerStats {
        NormalizerStats {
            medians: vec![0.0; n],
            means: vec![0.0; n],
            stds: vec![1.0; n],
        }
    }

    fn trained(config: &EngineConfig) -> TrainedEnsemble {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, (30 - i) as f64]).collect();
        let y: Vec<f64> = (0..30).map(|i| 1.0 + i as f64).collect();
        let outcome = train_families(&x, &y, config).unwrap();
        build_ensemble(outcome, feature_set(2), stats(2), 30.0).unwrap()
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
    fn weights_sum_to_one() {
        let ensemble = trained(&fast_config());
        assert_eq!(ensemble.weights.entries.len(), 4);
        assert!((ensemble.weights.sum() - 1.0).abs() < 1e-6);
        assert!(ensemble.weights.entries.iter().all(|(_, w)| *w >= 0.0));
    }

    #[test]
    fn weights_renormalize_over_survivors() {
        let mut config = fast_config();
        config.lasso_alpha = f64::NAN; // lasso fails to fit
        let ensemble = trained(&config);

        assert_eq!(ensemble.models.len(), 3);
        assert!(ensemble.weights.get(ModelKind::Lasso).is_none());
        assert!((ensemble.weights.sum() - 1.0).abs() < 1e-6);
        assert!(ensemble
            .skipped
            .iter()
            .any(|(kind, _)| *kind == ModelKind::Lasso));
    }

    #[test]
    fn lower_cv_error_earns_higher_weight() {
        let ensemble = trained(&fast_config());
        let best = ensemble
            .cv
            .iter()
            .min_by(|a, b| a.mean_mae.partial_cmp(&b.mean_mae).unwrap())
            .unwrap();
        let worst = ensemble
            .cv
            .iter()
            .max_by(|a, b| a.mean_mae.partial_cmp(&b.mean_mae).unwrap())
            .unwrap();
        if best.mean_mae < worst.mean_mae {
            assert!(
                ensemble.weights.get(best.model).unwrap()
                    >= ensemble.weights.get(worst.model).unwrap()
            );
        }
    }

    #[test]
    fn predictions_stay_inside_the_rank_bounds() {
        let ensemble = trained(&fast_config());
        // Far outside the training range in both directions.
        let (low, _) = ensemble.predict_row(&[-1000.0, 1000.0]);
        let (high, _) = ensemble.predict_row(&[1000.0, -1000.0]);
        assert!(low >= 1.0 && low <= 30.0);
        assert!(high >= 1.0 && high <= 30.0);

        let (_, by_model) = ensemble.predict_row(&[1000.0, -1000.0]);
        for (_, pred) in by_model {
            assert!((1.0..=30.0).contains(&pred));
        }
    }

    #[test]
    fn single_family_gets_full_weight() {
        let mut config = fast_config();
        config.model_spec = ModelSelection::Ridge;
        let ensemble = trained(&config);
        assert_eq!(ensemble.weights.entries.len(), 1);
        assert!((ensemble.weights.get(ModelKind::Ridge).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_clip_bound_is_rejected() {
        let config = fast_config();
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let outcome = train_families(&x, &y, &config).unwrap();
        let err = build_ensemble(outcome, feature_set(2), stats(2), 0.0).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
