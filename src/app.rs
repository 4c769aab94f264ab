//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - builds the engine configuration
//! - runs the training pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, FitArgs};
use crate::domain::{
    BoostParams, EngineConfig, ForestParams, TierSpec,
};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `prospect` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args, OutputMode::Full),
        Command::Rank(args) => handle_fit(args, OutputMode::BoardOnly),
        Command::Audit(args) => handle_audit(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    BoardOnly,
}

fn handle_fit(args: FitArgs, mode: OutputMode) -> Result<(), AppError> {
    let config = engine_config_from_args(&args)?;
    let run = pipeline::run_training(&config)?;

    match mode {
        OutputMode::Full => {
            println!(
                "{}",
                crate::report::format_run_summary(
                    &run.roster,
                    &run.ensemble,
                    &run.evaluation,
                    &run.exclusions,
                    &config,
                )
            );
            println!("{}", crate::report::format_review_tables(&run.evaluation));
        }
        OutputMode::BoardOnly => {
            println!("{}", crate::report::format_board(&run.predictions));
        }
    }

    // Optional exports.
    let model_order: Vec<_> = run.ensemble.models.iter().map(|(kind, _)| *kind).collect();
    if let Some(path) = &config.export_predictions {
        crate::io::export::write_predictions_csv(path, &run.predictions, &model_order)?;
    }
    if let Some(path) = &config.export_summary {
        let summary = crate::io::summary::build_run_summary(
            &run.roster,
            &run.ensemble,
            &run.evaluation,
            &run.exclusions,
            &config,
        );
        crate::io::summary::write_summary_json(path, &summary)?;
    }
    if let Some(path) = &config.export_manifest {
        let manifest =
            crate::io::summary::build_feature_manifest(&run.roster, &run.ensemble, &run.exclusions);
        crate::io::summary::write_manifest_json(path, &manifest)?;
    }
    if let Some(path) = &config.audit_file {
        crate::report::write_audit_report(
            path,
            &run.roster,
            &run.exclusions,
            &run.ensemble.skipped,
            &config,
        )?;
    }

    Ok(())
}

fn handle_audit(args: FitArgs) -> Result<(), AppError> {
    let config = engine_config_from_args(&args)?;
    let prepared = pipeline::prepare_features(&config)?;

    println!(
        "Features surviving classification: {} (of {} ingested columns)\n",
        prepared.matrix.feature_set.len(),
        prepared.roster.columns.len(),
    );
    println!("{}", crate::report::format_exclusions(&prepared.exclusions));

    if let Some(path) = &config.audit_file {
        crate::report::write_audit_report(path, &prepared.roster, &prepared.exclusions, &[], &config)?;
    }

    Ok(())
}

pub fn engine_config_from_args(args: &FitArgs) -> Result<EngineConfig, AppError> {
    if !(args.hard_corr > 0.0 && args.hard_corr <= 1.0) {
        return Err(AppError::new(2, "hard-corr must be in (0, 1]."));
    }
    if !(args.soft_corr > 0.0 && args.soft_corr <= args.hard_corr) {
        return Err(AppError::new(2, "soft-corr must be in (0, hard-corr]."));
    }
    if !(args.test_fraction >= 0.0 && args.test_fraction < 1.0) {
        return Err(AppError::new(2, "test-fraction must be in [0, 1)."));
    }
    if args.folds < 2 {
        return Err(AppError::new(2, "folds must be >= 2."));
    }

    Ok(EngineConfig {
        csv_path: args.csv.clone(),
        target_column: args.target.clone(),
        hard_corr: args.hard_corr,
        soft_corr: args.soft_corr,
        min_coverage: args.min_coverage,
        epsilon: args.epsilon,
        folds: args.folds,
        seed: args.seed,
        test_fraction: args.test_fraction,
        roster_size: args.roster_size,
        model_spec: args.model,
        forest: ForestParams {
            trees: args.trees,
            max_depth: args.forest_depth,
            min_samples_split: args.min_split,
            min_samples_leaf: args.min_leaf,
        },
        boost: BoostParams {
            stages: args.stages,
            max_depth: args.boost_depth,
            learning_rate: args.learning_rate,
            subsample: args.subsample,
        },
        ridge_alpha: args.ridge_alpha,
        lasso_alpha: args.lasso_alpha,
        tiers: parse_tiers(&args.tiers)?,
        top_k: args.top,
        export_predictions: args.export.clone(),
        export_summary: args.export_summary.clone(),
        export_manifest: args.export_manifest.clone(),
        audit_file: args.audit_file.clone(),
    })
}

/// Parse `Label:lo-hi` pairs, comma separated. An empty string disables the
/// tier table.
fn parse_tiers(raw: &str) -> Result<Vec<TierSpec>, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut tiers = Vec::new();
    for part in trimmed.split(',') {
        let (label, range) = part
            .split_once(':')
            .ok_or_else(|| AppError::new(2, format!("Invalid tier '{part}': expected Label:lo-hi.")))?;
        let (lo, hi) = range
            .split_once('-')
            .ok_or_else(|| AppError::new(2, format!("Invalid tier range '{range}': expected lo-hi.")))?;
        let lo: f64 = lo
            .trim()
            .parse()
            .map_err(|_| AppError::new(2, format!("Invalid tier bound '{lo}'.")))?;
        let hi: f64 = hi
            .trim()
            .parse()
            .map_err(|_| AppError::new(2, format!("Invalid tier bound '{hi}'.")))?;
        if !(lo >= 1.0 && hi >= lo) {
            return Err(AppError::new(2, format!("Tier '{part}' has an empty range.")));
        }
        tiers.push(TierSpec {
            label: label.trim().to_string(),
            lo,
            hi,
        });
    }
    Ok(tiers)
}
