//! Run-summary and feature-manifest JSON artifacts.
//!
//! These are the "portable" outputs the display layer consumes:
//!
//! - the run summary: models, cross-validation and test metrics, weights,
//!   tier table, importance ranking
//! - the feature manifest: exactly what the models consumed, in order, plus
//!   everything that was excluded and why — the audit trail proving no leaky
//!   feature reached training
//!
//! Compatibility rests on stable field names, not byte layout.

use std::fs::File;
use std::path::Path;

use chrono::Local;
use serde::Serialize;

use crate::domain::{EngineConfig, ModelKind, Provenance, TierMetric};
use crate::error::AppError;
use crate::features::ExclusionReport;
use crate::io::ingest::RosterData;
use crate::report::metrics::{DominanceFlag, ErrorDistribution, EvalMetrics, Evaluation};
use crate::train::TrainedEnsemble;

const TOOL_NAME: &str = "prospect";

#[derive(Debug, Serialize)]
pub struct RunSummaryFile {
    pub tool: String,
    pub generated_at: String,
    pub target_column: String,
    pub n_records: usize,
    pub n_training: usize,
    pub n_features: usize,
    pub seed: u64,
    pub folds: usize,
    pub test_fraction: f64,
    pub thresholds: ThresholdsOut,
    pub models: Vec<ModelSummary>,
    pub skipped_models: Vec<SkippedModel>,
    pub weights: Vec<WeightEntry>,
    pub ensemble: EvalMetrics,
    pub error_distribution: ErrorDistribution,
    pub tiers: Vec<TierMetric>,
    pub feature_importance: Vec<ImportanceEntry>,
    pub dominance: DominanceFlag,
    pub excluded_features: usize,
    pub proxy_warnings: usize,
}

#[derive(Debug, Serialize)]
pub struct ThresholdsOut {
    pub hard_corr: f64,
    pub soft_corr: f64,
    pub min_coverage: f64,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub model: ModelKind,
    pub cv_mae_mean: f64,
    pub cv_mae_std: f64,
    pub cv_fold_errors: Vec<f64>,
    pub test: EvalMetrics,
}

#[derive(Debug, Serialize)]
pub struct SkippedModel {
    pub model: ModelKind,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct WeightEntry {
    pub model: ModelKind,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct ImportanceEntry {
    pub feature: String,
    pub share: f64,
}

#[derive(Debug, Serialize)]
pub struct FeatureManifestFile {
    pub tool: String,
    pub generated_at: String,
    pub target_column: String,
    pub features: Vec<ManifestFeature>,
    pub excluded: Vec<ManifestExclusion>,
}

#[derive(Debug, Serialize)]
pub struct ManifestFeature {
    pub name: String,
    pub provenance: Provenance,
    pub coverage: f64,
    pub median: f64,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Serialize)]
pub struct ManifestExclusion {
    pub feature: String,
    pub reason: String,
    pub detail: String,
}

pub fn build_run_summary(
    roster: &RosterData,
    ensemble: &TrainedEnsemble,
    evaluation: &Evaluation,
    exclusions: &ExclusionReport,
    config: &EngineConfig,
) -> RunSummaryFile {
    let models = ensemble
        .cv
        .iter()
        .map(|cv| {
            let test = evaluation
                .per_model
                .iter()
                .find(|(kind, _)| *kind == cv.model)
                .map(|(_, m)| m.clone())
                .unwrap_or_else(|| EvalMetrics {
                    n: 0,
                    mae: f64::NAN,
                    rmse: f64::NAN,
                    r2: None,
                    spearman: None,
                });
            ModelSummary {
                model: cv.model,
                cv_mae_mean: cv.mean_mae,
                cv_mae_std: cv.std_mae,
                cv_fold_errors: cv.fold_errors.clone(),
                test,
            }
        })
        .collect();

    RunSummaryFile {
        tool: TOOL_NAME.to_string(),
        generated_at: Local::now().to_rfc3339(),
        target_column: roster.target_column.clone(),
        n_records: roster.stats.n_records,
        n_training: roster.stats.n_training,
        n_features: ensemble.feature_set.len(),
        seed: config.seed,
        folds: config.folds,
        test_fraction: config.test_fraction,
        thresholds: ThresholdsOut {
            hard_corr: config.hard_corr,
            soft_corr: config.soft_corr,
            min_coverage: config.min_coverage,
        },
        models,
        skipped_models: ensemble
            .skipped
            .iter()
            .map(|(model, reason)| SkippedModel {
                model: *model,
                reason: reason.clone(),
            })
            .collect(),
        weights: ensemble
            .weights
            .entries
            .iter()
            .map(|(model, weight)| WeightEntry {
                model: *model,
                weight: *weight,
            })
            .collect(),
        ensemble: evaluation.ensemble.clone(),
        error_distribution: evaluation.distribution.clone(),
        tiers: evaluation.tiers.clone(),
        feature_importance: evaluation
            .importance
            .iter()
            .map(|(feature, share)| ImportanceEntry {
                feature: feature.clone(),
                share: *share,
            })
            .collect(),
        dominance: evaluation.dominance.clone(),
        excluded_features: exclusions.excluded.len(),
        proxy_warnings: exclusions.warnings.len(),
    }
}

pub fn build_feature_manifest(
    roster: &RosterData,
    ensemble: &TrainedEnsemble,
    exclusions: &ExclusionReport,
) -> FeatureManifestFile {
    let features = ensemble
        .feature_set
        .descriptors
        .iter()
        .enumerate()
        .map(|(j, d)| ManifestFeature {
            name: d.name.clone(),
            provenance: d.provenance,
            coverage: d.coverage,
            median: ensemble.normalizer.medians[j],
            mean: ensemble.normalizer.means[j],
            std: ensemble.normalizer.stds[j],
        })
        .collect();

    FeatureManifestFile {
        tool: TOOL_NAME.to_string(),
        generated_at: Local::now().to_rfc3339(),
        target_column: roster.target_column.clone(),
        features,
        excluded: exclusions
            .excluded
            .iter()
            .map(|e| ManifestExclusion {
                feature: e.feature.clone(),
                reason: e.reason.label().to_string(),
                detail: e.reason.detail(),
            })
            .collect(),
    }
}

pub fn write_summary_json(path: &Path, summary: &RunSummaryFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create run summary '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write run summary JSON: {e}")))
}

pub fn write_manifest_json(path: &Path, manifest: &FeatureManifestFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create feature manifest '{}': {e}", path.display()),
        )
    })?;
    serde_json::to_writer_pretty(file, manifest)
        .map_err(|e| AppError::new(2, format!("Failed to write feature manifest JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_serializes_with_stable_field_names() {
        let manifest = FeatureManifestFile {
            tool: TOOL_NAME.to_string(),
            generated_at: "2025-06-26T00:00:00Z".to_string(),
            target_column: "actual_rank".to_string(),
            features: vec![ManifestFeature {
                name: "ppg".to_string(),
                provenance: Provenance::Observable,
                coverage: 1.0,
                median: 10.0,
                mean: 11.0,
                std: 2.0,
            }],
            excluded: vec![ManifestExclusion {
                feature: "ml_rank".to_string(),
                reason: "leakage (name)".to_string(),
                detail: "name matches 'rank'".to_string(),
            }],
        };

        let json = serde_json::to_string(&manifest).unwrap();
        assert!(json.contains("\"target_column\":\"actual_rank\""));
        assert!(json.contains("\"provenance\":\"observable\""));
        assert!(json.contains("\"ml_rank\""));
    }

    #[test]
    fn weight_entries_serialize_model_names() {
        let entry = WeightEntry {
            model: ModelKind::Forest,
            weight: 0.4,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"model\":\"forest\""));
    }
}
