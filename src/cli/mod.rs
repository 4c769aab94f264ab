//! Command-line parsing for the prospect ranking engine.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::ModelSelection;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "prospect", version, about = "Prospect Ranking Ensemble Engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train the ensemble, print diagnostics and review tables, optionally export artifacts.
    Fit(FitArgs),
    /// Print the predicted board only (useful for scripting).
    Rank(FitArgs),
    /// Classify features without training and print the exclusion report.
    Audit(FitArgs),
}

/// Common options for fitting, ranking and auditing.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Roster CSV with one row per prospect.
    pub csv: PathBuf,

    /// Ground-truth rank column (default: first of actual_rank, rank, draft_position).
    #[arg(long)]
    pub target: Option<String>,

    /// Hard leakage threshold: |correlation| above this excludes a feature.
    #[arg(long, default_value_t = 0.8)]
    pub hard_corr: f64,

    /// Soft leakage threshold: the band up to the hard threshold warns.
    #[arg(long, default_value_t = 0.6)]
    pub soft_corr: f64,

    /// Minimum non-missing fraction a feature needs to survive.
    #[arg(long, default_value_t = 0.5)]
    pub min_coverage: f64,

    /// Additive denominator stabilizer for ratio signals.
    #[arg(long, default_value_t = 0.1)]
    pub epsilon: f64,

    /// Cross-validation fold count.
    #[arg(short = 'k', long, default_value_t = 5)]
    pub folds: usize,

    /// Random seed for fold shuffling, splits and tree bagging.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fraction of ranked rows held out for evaluation (0 evaluates in-sample).
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Roster size N used as the prediction clip bound (default: rows used).
    #[arg(long)]
    pub roster_size: Option<usize>,

    /// Which model families to train.
    #[arg(long, value_enum, default_value_t = ModelSelection::All)]
    pub model: ModelSelection,

    /// Forest: number of bagged trees.
    #[arg(long, default_value_t = 300)]
    pub trees: usize,

    /// Forest: maximum tree depth.
    #[arg(long, default_value_t = 10)]
    pub forest_depth: usize,

    /// Forest: minimum rows to attempt a split.
    #[arg(long, default_value_t = 5)]
    pub min_split: usize,

    /// Forest: minimum rows per leaf.
    #[arg(long, default_value_t = 2)]
    pub min_leaf: usize,

    /// Boosting: number of stages.
    #[arg(long, default_value_t = 200)]
    pub stages: usize,

    /// Boosting: maximum tree depth per stage.
    #[arg(long, default_value_t = 5)]
    pub boost_depth: usize,

    /// Boosting: learning rate.
    #[arg(long, default_value_t = 0.05)]
    pub learning_rate: f64,

    /// Boosting: row subsample rate per stage.
    #[arg(long, default_value_t = 0.8)]
    pub subsample: f64,

    /// Ridge regularization strength.
    #[arg(long, default_value_t = 10.0)]
    pub ridge_alpha: f64,

    /// Lasso regularization strength.
    #[arg(long, default_value_t = 1.0)]
    pub lasso_alpha: f64,

    /// Rank tiers as `Label:lo-hi` pairs, comma separated.
    #[arg(long, default_value = "Lottery:1-10,First Round:11-30,Second Round:31-60")]
    pub tiers: String,

    /// How many best/worst predictions to show.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Export per-prospect predictions to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the run summary (models, metrics, weights) to JSON.
    #[arg(long = "export-summary")]
    pub export_summary: Option<PathBuf>,

    /// Export the feature manifest (the audit trail) to JSON.
    #[arg(long = "export-manifest")]
    pub export_manifest: Option<PathBuf>,

    /// Write the exclusion audit report to a markdown file.
    #[arg(long = "audit-file")]
    pub audit_file: Option<PathBuf>,
}
