//! Evaluation metrics over a prediction set.
//!
//! All metrics run over predictions whose actual rank is known (the held-out
//! split in a normal run). Spearman and R² are undefined on degenerate sets
//! (fewer than two rows, constant actuals) and are reported as absent rather
//! than faked as zero.

use serde::{Deserialize, Serialize};

use crate::domain::{ModelKind, PredictionRecord, TierMetric, TierSpec};
use crate::error::AppError;
use crate::math::{mae, mean, median, r_squared, rmse, spearman};
use crate::train::TrainedEnsemble;

/// Share of total importance above which a single feature is an overfitting
/// risk worth flagging loudly.
const DOMINANCE_STRONG: f64 = 0.5;
const DOMINANCE_MODERATE: f64 = 0.3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub n: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: Option<f64>,
    pub spearman: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDistribution {
    pub median_abs: f64,
    pub mean_abs: f64,
    pub max_abs: f64,
    /// Fraction of predictions within 5 and 10 rank positions.
    pub within_5: f64,
    pub within_10: f64,
}

/// Importance concentration verdict from the bagged forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "lowercase")]
pub enum DominanceFlag {
    None,
    Moderate { feature: String, share: f64 },
    Strong { feature: String, share: f64 },
}

/// Everything the evaluator derives from a prediction set.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub ensemble: EvalMetrics,
    pub per_model: Vec<(ModelKind, EvalMetrics)>,
    pub distribution: ErrorDistribution,
    pub tiers: Vec<TierMetric>,
    /// Feature name and importance share, ranked descending.
    pub importance: Vec<(String, f64)>,
    pub dominance: DominanceFlag,
    pub best: Vec<PredictionRecord>,
    pub worst: Vec<PredictionRecord>,
}

/// Evaluate predictions with known actuals.
pub fn evaluate(
    predictions: &[PredictionRecord],
    ensemble: &TrainedEnsemble,
    tiers: &[TierSpec],
    top_k: usize,
) -> Result<Evaluation, AppError> {
    let scored: Vec<&PredictionRecord> = predictions
        .iter()
        .filter(|p| p.actual_rank.is_some())
        .collect();
    if scored.is_empty() {
        return Err(AppError::new(3, "No predictions with known ranks to evaluate."));
    }

    let actual: Vec<f64> = scored.iter().filter_map(|p| p.actual_rank).collect();
    let predicted: Vec<f64> = scored.iter().map(|p| p.predicted_rank).collect();

    let ensemble_metrics = metrics_for(&actual, &predicted)?;

    let mut per_model = Vec::new();
    for (kind, _) in &ensemble.models {
        let sub: Vec<f64> = scored
            .iter()
            .map(|p| {
                p.by_model
                    .iter()
                    .find(|(k, _)| k == kind)
                    .map(|(_, v)| *v)
                    .unwrap_or(f64::NAN)
            })
            .collect();
        per_model.push((*kind, metrics_for(&actual, &sub)?));
    }

    let abs_errors: Vec<f64> = actual
        .iter()
        .zip(&predicted)
        .map(|(a, p)| (a - p).abs())
        .collect();
    let distribution = ErrorDistribution {
        median_abs: median(&abs_errors).unwrap_or(0.0),
        mean_abs: mean(&abs_errors).unwrap_or(0.0),
        max_abs: abs_errors.iter().copied().fold(0.0, f64::max),
        within_5: fraction_within(&abs_errors, 5.0),
        within_10: fraction_within(&abs_errors, 10.0),
    };

    let tiers = tier_metrics(&scored, tiers);
    let importance = ranked_importance(ensemble);
    let dominance = dominance_flag(&importance);
    let (best, worst) = best_and_worst(&scored, top_k);

    Ok(Evaluation {
        ensemble: ensemble_metrics,
        per_model,
        distribution,
        tiers,
        importance,
        dominance,
        best,
        worst,
    })
}

fn metrics_for(actual: &[f64], predicted: &[f64]) -> Result<EvalMetrics, AppError> {
    let mae = mae(actual, predicted)
        .ok_or_else(|| AppError::new(4, "Empty metric computation."))?;
    let rmse = rmse(actual, predicted)
        .ok_or_else(|| AppError::new(4, "Empty metric computation."))?;
    Ok(EvalMetrics {
        n: actual.len(),
        mae,
        rmse,
        r2: r_squared(actual, predicted),
        spearman: spearman(actual, predicted),
    })
}

fn fraction_within(abs_errors: &[f64], bound: f64) -> f64 {
    if abs_errors.is_empty() {
        return 0.0;
    }
    abs_errors.iter().filter(|e| **e <= bound).count() as f64 / abs_errors.len() as f64
}

/// Per-tier MAE over rows whose *actual* rank falls in the tier range.
fn tier_metrics(scored: &[&PredictionRecord], tiers: &[TierSpec]) -> Vec<TierMetric> {
    tiers
        .iter()
        .map(|tier| {
            let errors: Vec<f64> = scored
                .iter()
                .filter_map(|p| {
                    let rank = p.actual_rank?;
                    (rank >= tier.lo && rank <= tier.hi).then(|| p.abs_error.unwrap_or(0.0))
                })
                .collect();
            TierMetric {
                label: tier.label.clone(),
                lo: tier.lo,
                hi: tier.hi,
                mae: mean(&errors).unwrap_or(0.0),
                count: errors.len(),
            }
        })
        .collect()
}

fn ranked_importance(ensemble: &TrainedEnsemble) -> Vec<(String, f64)> {
    let Some(shares) = ensemble.forest_importance() else {
        return Vec::new();
    };
    let mut ranked: Vec<(String, f64)> = ensemble
        .feature_set
        .descriptors
        .iter()
        .zip(shares)
        .map(|(d, &share)| (d.name.clone(), share))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

fn dominance_flag(importance: &[(String, f64)]) -> DominanceFlag {
    let Some((feature, share)) = importance.first() else {
        return DominanceFlag::None;
    };
    if *share > DOMINANCE_STRONG {
        DominanceFlag::Strong {
            feature: feature.clone(),
            share: *share,
        }
    } else if *share > DOMINANCE_MODERATE {
        DominanceFlag::Moderate {
            feature: feature.clone(),
            share: *share,
        }
    } else {
        DominanceFlag::None
    }
}

fn best_and_worst(
    scored: &[&PredictionRecord],
    top_k: usize,
) -> (Vec<PredictionRecord>, Vec<PredictionRecord>) {
    let mut sorted: Vec<&PredictionRecord> = scored.to_vec();
    sorted.sort_by(|a, b| {
        let ea = a.abs_error.unwrap_or(f64::INFINITY);
        let eb = b.abs_error.unwrap_or(f64::INFINITY);
        ea.partial_cmp(&eb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let best = sorted.iter().take(top_k).map(|p| (*p).clone()).collect();
    let worst = sorted
        .iter()
        .rev()
        .take(top_k)
        .map(|p| (*p).clone())
        .collect();
    (best, worst)
}
