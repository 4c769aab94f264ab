//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during training
//! - exported to JSON/CSV
//! - reloaded later for dashboards or comparisons

use std::collections::HashMap;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Where a feature's value comes from, relative to the outcome being predicted.
///
/// `Leaky` features never reach training; the variant exists so exclusion
/// reports can carry the classification decision alongside the survivors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Knowable at prediction time, independent of the outcome.
    Observable,
    /// Computed from observable inputs by the synthesizer.
    Derived,
    /// Derived from or near-perfectly correlated with the outcome.
    Leaky,
}

/// One feature the model may consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub name: String,
    pub provenance: Provenance,
    /// Fraction of roster records with a non-missing value, in `[0, 1]`.
    pub coverage: f64,
}

/// The ordered list of features every record is projected onto.
///
/// Frozen after normalization: train-time and inference-time transforms use
/// the same names in the same order, always.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSet {
    pub descriptors: Vec<FeatureDescriptor>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }
}

/// One prospect on the roster.
///
/// `actual_rank` is present for training rows and absent for inference-only
/// rows (e.g., prospects whose outcome is not yet known).
#[derive(Debug, Clone)]
pub struct ProspectRecord {
    pub id: String,
    pub name: String,
    pub position: Option<String>,
    /// Raw numeric attributes keyed by declared column name. Missing values
    /// are simply absent from the map.
    pub attributes: HashMap<String, f64>,
    pub actual_rank: Option<f64>,
}

/// A named column of optional values, aligned with roster order.
#[derive(Debug, Clone)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl RawColumn {
    pub fn coverage(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let present = self.values.iter().filter(|v| v.is_some()).count();
        present as f64 / self.values.len() as f64
    }
}

/// Model families in the ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Forest,
    Boost,
    Ridge,
    Lasso,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Forest => "Random Forest",
            ModelKind::Boost => "Gradient Boosting",
            ModelKind::Ridge => "Ridge",
            ModelKind::Lasso => "Lasso",
        }
    }

    /// All families in deterministic training order.
    pub fn all() -> [ModelKind; 4] {
        [
            ModelKind::Forest,
            ModelKind::Boost,
            ModelKind::Ridge,
            ModelKind::Lasso,
        ]
    }
}

/// Which model(s) to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSelection {
    All,
    /// Both tree families (forest + boosting).
    Trees,
    /// Both regularized linear families (ridge + lasso).
    Linear,
    Forest,
    Boost,
    Ridge,
    Lasso,
}

impl std::fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSelection::All => "all",
            ModelSelection::Trees => "trees",
            ModelSelection::Linear => "linear",
            ModelSelection::Forest => "forest",
            ModelSelection::Boost => "boost",
            ModelSelection::Ridge => "ridge",
            ModelSelection::Lasso => "lasso",
        };
        write!(f, "{name}")
    }
}

impl ModelSelection {
    pub fn kinds(self) -> Vec<ModelKind> {
        match self {
            ModelSelection::All => ModelKind::all().to_vec(),
            ModelSelection::Trees => vec![ModelKind::Forest, ModelKind::Boost],
            ModelSelection::Linear => vec![ModelKind::Ridge, ModelKind::Lasso],
            ModelSelection::Forest => vec![ModelKind::Forest],
            ModelSelection::Boost => vec![ModelKind::Boost],
            ModelSelection::Ridge => vec![ModelKind::Ridge],
            ModelSelection::Lasso => vec![ModelKind::Lasso],
        }
    }
}

/// Cross-validation outcome for one model family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResult {
    pub model: ModelKind,
    /// Held-out mean absolute error per fold.
    pub fold_errors: Vec<f64>,
    pub mean_mae: f64,
    pub std_mae: f64,
}

/// Per-model ensemble weights. Non-negative, summing to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleWeights {
    pub entries: Vec<(ModelKind, f64)>,
}

impl EnsembleWeights {
    pub fn get(&self, kind: ModelKind) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, w)| *w)
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }
}

/// Final blended prediction for one prospect.
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    pub id: String,
    pub name: String,
    pub position: Option<String>,
    pub actual_rank: Option<f64>,
    /// Clamped to `[1, N]` where `N` is the roster size.
    pub predicted_rank: f64,
    pub by_model: Vec<(ModelKind, f64)>,
    /// Present only when the actual rank is known.
    pub abs_error: Option<f64>,
}

/// A contiguous sub-range of the rank scale for stratified error reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierSpec {
    pub label: String,
    pub lo: f64,
    pub hi: f64,
}

/// Per-tier error over an evaluation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierMetric {
    pub label: String,
    pub lo: f64,
    pub hi: f64,
    pub mae: f64,
    pub count: usize,
}

/// Forest hyperparameters.
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            trees: 300,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

/// Boosting hyperparameters.
#[derive(Debug, Clone)]
pub struct BoostParams {
    pub stages: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            stages: 200,
            max_depth: 5,
            learning_rate: 0.05,
            subsample: 0.8,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) and passed by reference
/// through every stage; nothing in the pipeline reads ambient state.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub csv_path: PathBuf,
    /// Explicit target column; when `None` the ingest resolves one of the
    /// recognized rank columns.
    pub target_column: Option<String>,

    /// |correlation| above this is hard leakage: the feature is excluded.
    pub hard_corr: f64,
    /// |correlation| between this and `hard_corr` keeps the feature but flags
    /// it as a possible proxy for the outcome.
    pub soft_corr: f64,
    /// Minimum non-missing fraction a feature needs to survive.
    pub min_coverage: f64,
    /// Additive denominator stabilizer for ratio signals.
    pub epsilon: f64,

    pub folds: usize,
    pub seed: u64,
    /// Fraction of training rows held out for final evaluation. Zero means
    /// evaluate in-sample (useful for tiny synthetic rosters).
    pub test_fraction: f64,
    /// Clip bound for predictions; defaults to the number of roster rows used.
    pub roster_size: Option<usize>,

    pub model_spec: ModelSelection,
    pub forest: ForestParams,
    pub boost: BoostParams,
    pub ridge_alpha: f64,
    pub lasso_alpha: f64,

    pub tiers: Vec<TierSpec>,
    /// How many best/worst predictions to surface for qualitative review.
    pub top_k: usize,

    pub export_predictions: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
    pub export_manifest: Option<PathBuf>,
    pub audit_file: Option<PathBuf>,
}

impl EngineConfig {
    /// Defaults mirroring the CLI defaults, handy for tests and embedding.
    pub fn with_csv(csv_path: impl Into<PathBuf>) -> Self {
        Self {
            csv_path: csv_path.into(),
            target_column: None,
            hard_corr: 0.8,
            soft_corr: 0.6,
            min_coverage: 0.5,
            epsilon: 0.1,
            folds: 5,
            seed: 42,
            test_fraction: 0.2,
            roster_size: None,
            model_spec: ModelSelection::All,
            forest: ForestParams::default(),
            boost: BoostParams::default(),
            ridge_alpha: 10.0,
            lasso_alpha: 1.0,
            tiers: default_tiers(),
            top_k: 5,
            export_predictions: None,
            export_summary: None,
            export_manifest: None,
            audit_file: None,
        }
    }
}

/// Default rank tiers for a two-round draft board.
pub fn default_tiers() -> Vec<TierSpec> {
    vec![
        TierSpec {
            label: "Lottery".to_string(),
            lo: 1.0,
            hi: 10.0,
        },
        TierSpec {
            label: "First Round".to_string(),
            lo: 11.0,
            hi: 30.0,
        },
        TierSpec {
            label: "Second Round".to_string(),
            lo: 31.0,
            hi: 60.0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_counts_present_values() {
        let col = RawColumn {
            name: "ppg".to_string(),
            values: vec![Some(1.0), None, Some(3.0), None],
        };
        assert!((col.coverage() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn coverage_of_empty_column_is_zero() {
        let col = RawColumn {
            name: "ppg".to_string(),
            values: vec![],
        };
        assert_eq!(col.coverage(), 0.0);
    }

    #[test]
    fn model_selection_expands_to_kinds() {
        assert_eq!(ModelSelection::All.kinds().len(), 4);
        assert_eq!(ModelSelection::Ridge.kinds(), vec![ModelKind::Ridge]);
        assert_eq!(
            ModelSelection::Linear.kinds(),
            vec![ModelKind::Ridge, ModelKind::Lasso]
        );
        assert_eq!(
            ModelSelection::Trees.kinds(),
            vec![ModelKind::Forest, ModelKind::Boost]
        );
    }

    #[test]
    fn default_tiers_cover_sixty_picks() {
        let tiers = default_tiers();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0].lo, 1.0);
        assert_eq!(tiers[2].hi, 60.0);
    }
}
