//! Shared pipeline logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> classify -> synthesize -> normalize -> train -> combine -> evaluate
//!
//! The flow is strictly linear; each stage consumes the previous stage's
//! output and nothing else. The fit phase ends with an immutable
//! `TrainedEnsemble`; prediction and evaluation only read it.

use crate::domain::{EngineConfig, PredictionRecord};
use crate::error::AppError;
use crate::features::{
    classify_columns, normalize_features, synthesize_features, ExclusionReport, NormalizedMatrix,
};
use crate::io::ingest::{load_roster, RosterData};
use crate::report::metrics::{evaluate, Evaluation};
use crate::train::{build_ensemble, split_train_test, train_families, TrainedEnsemble};

/// Output of the feature stages, before any training.
#[derive(Debug)]
pub struct PreparedFeatures {
    pub roster: RosterData,
    pub matrix: NormalizedMatrix,
    pub exclusions: ExclusionReport,
}

/// All computed outputs of a single run.
#[derive(Debug)]
pub struct RunOutput {
    pub roster: RosterData,
    pub exclusions: ExclusionReport,
    pub ensemble: TrainedEnsemble,
    /// One prediction per roster record, in roster order.
    pub predictions: Vec<PredictionRecord>,
    pub evaluation: Evaluation,
    /// Roster indices that fed the evaluation metrics.
    pub eval_rows: Vec<usize>,
}

/// Ingest and run the feature stages only (the `audit` subcommand).
pub fn prepare_features(config: &EngineConfig) -> Result<PreparedFeatures, AppError> {
    prepare_from_roster(load_roster(config)?, config)
}

/// Feature stages over an already-ingested roster.
pub fn prepare_from_roster(
    roster: RosterData,
    config: &EngineConfig,
) -> Result<PreparedFeatures, AppError> {
    let classified = classify_columns(&roster.columns, &roster.absent, &roster.target, config);
    let mut exclusions = classified.report;
    let mut survivors = classified.survivors;

    let derived = synthesize_features(
        &survivors,
        &roster.records,
        &roster.target,
        config,
        &mut exclusions,
    );
    survivors.extend(derived);

    let training_mask: Vec<bool> = roster.target.iter().map(Option::is_some).collect();
    let matrix = normalize_features(&survivors, &training_mask, &mut exclusions)?;

    Ok(PreparedFeatures {
        roster,
        matrix,
        exclusions,
    })
}

/// Execute the full pipeline from the configured CSV.
pub fn run_training(config: &EngineConfig) -> Result<RunOutput, AppError> {
    run_with_roster(load_roster(config)?, config)
}

/// Execute the full pipeline over an already-ingested roster.
pub fn run_with_roster(roster: RosterData, config: &EngineConfig) -> Result<RunOutput, AppError> {
    let PreparedFeatures {
        roster,
        matrix,
        exclusions,
    } = prepare_from_roster(roster, config)?;

    let training_rows: Vec<usize> = roster
        .target
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.is_some().then_some(i))
        .collect();

    // Hold out the evaluation split within the training population.
    let (fit_rel, test_rel) = split_train_test(training_rows.len(), config.test_fraction, config.seed);
    let fit_rows: Vec<usize> = fit_rel.iter().map(|&r| training_rows[r]).collect();
    let test_rows: Vec<usize> = test_rel.iter().map(|&r| training_rows[r]).collect();

    let fit_x: Vec<Vec<f64>> = fit_rows.iter().map(|&i| matrix.rows[i].clone()).collect();
    let fit_y: Vec<f64> = fit_rows.iter().filter_map(|&i| roster.target[i]).collect();

    let outcome = train_families(&fit_x, &fit_y, config)?;

    let clip_max = config.roster_size.unwrap_or(roster.stats.n_records) as f64;
    let ensemble = build_ensemble(
        outcome,
        matrix.feature_set.clone(),
        matrix.stats.clone(),
        clip_max,
    )?;

    let predictions: Vec<PredictionRecord> = roster
        .records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let (predicted, by_model) = ensemble.predict_row(&matrix.rows[i]);
            PredictionRecord {
                id: record.id.clone(),
                name: record.name.clone(),
                position: record.position.clone(),
                actual_rank: roster.target[i],
                predicted_rank: predicted,
                by_model,
                abs_error: roster.target[i].map(|a| (a - predicted).abs()),
            }
        })
        .collect();

    // With no held-out rows the metrics are in-sample; the report makes the
    // evaluation-set size visible either way.
    let eval_rows = if test_rows.is_empty() { fit_rows } else { test_rows };
    let eval_predictions: Vec<PredictionRecord> =
        eval_rows.iter().map(|&i| predictions[i].clone()).collect();
    let evaluation = evaluate(&eval_predictions, &ensemble, &config.tiers, config.top_k)?;

    Ok(RunOutput {
        roster,
        exclusions,
        ensemble,
        predictions,
        evaluation,
        eval_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelSelection;
    use crate::io::ingest::read_roster;
    use std::io::Cursor;

    /// Deterministic 60-prospect roster. Rank is driven by a noisy blend of
    /// the observable stats; one column mirrors the rank exactly (leaky), one
    /// is present for only a tenth of the roster.
    fn synthetic_roster_csv() -> String {
        let mut csv = String::from(
            "name,position,ppg,rpg,apg,fga,turnovers,age,minutes,ml_grade,combine_index,vertical_index,rare_signal,actual_rank\n",
        );
        for i in 0..60 {
            let rank = (i + 1) as f64;
            let position = ["PG", "SG", "SF", "PF", "C"][i % 5];
            // Pseudo-noise streams from the row index keep the file
            // deterministic while holding every observable's correlation with
            // the rank well below the hard leakage threshold.
            let n1 = ((i * 37 % 11) as f64 - 5.0) * 1.5;
            let n2 = ((i * 13 % 7) as f64 - 3.0) * 0.9;
            let n3 = ((i * 29 % 5) as f64 - 2.0) * 0.8;
            let n4 = ((i * 19 % 9) as f64 - 4.0) * 0.7;
            let n5 = ((i * 41 % 23) as f64 - 11.0) * 3.3;
            let ppg = 20.0 - rank * 0.15 + n1;
            let rpg = 8.0 - rank * 0.05 + n2;
            let apg = 6.0 - rank * 0.04 + n3;
            let fga = 8.0 + ppg * 0.4 + n4;
            let turnovers = 1.5 + ((i * 17 % 9) as f64) * 0.25;
            let age = 18.0 + (i % 5) as f64;
            let minutes = 22.0 + ((i * 23 % 13) as f64);
            let ml_grade = 100.0 - rank; // caught by the name rules
            let combine_index = 60.0 - rank + n5; // soft-band proxy
            let vertical_index = 61.0 - rank; // innocent name, |corr| = 1
            let rare = if i % 10 == 0 {
                format!("{:.1}", rank * 2.0)
            } else {
                String::new()
            };
            csv.push_str(&format!(
                "Prospect {i},{position},{ppg:.2},{rpg:.2},{apg:.2},{fga:.2},{turnovers:.2},{age:.0},{minutes:.0},{ml_grade:.1},{combine_index:.2},{vertical_index:.1},{rare},{rank:.0}\n",
            ));
        }
        csv
    }

    fn fast_config() -> EngineConfig {
        let mut config = EngineConfig::with_csv("synthetic.csv");
        config.forest.trees = 15;
        config.forest.max_depth = 5;
        config.boost.stages = 30;
        config.folds = 4;
        config
    }

    fn run(csv: &str, config: &EngineConfig) -> RunOutput {
        let roster = read_roster(Cursor::new(csv.to_string()), config).unwrap();
        run_with_roster(roster, config).unwrap()
    }

    #[test]
    fn full_run_satisfies_the_core_invariants() {
        let config = fast_config();
        let output = run(&synthetic_roster_csv(), &config);

        // Weights sum to one.
        assert!((output.ensemble.weights.sum() - 1.0).abs() < 1e-6);

        // Every prediction is inside [1, N].
        assert_eq!(output.predictions.len(), 60);
        for p in &output.predictions {
            assert!(p.predicted_rank >= 1.0 && p.predicted_rank <= 60.0);
        }

        // Tier counts over the evaluation split sum to its size.
        let total: usize = output.evaluation.tiers.iter().map(|t| t.count).sum();
        assert_eq!(total, output.eval_rows.len());
    }

    #[test]
    fn leaky_and_sparse_columns_never_reach_the_manifest() {
        let config = fast_config();
        let output = run(&synthetic_roster_csv(), &config);
        let names = output.ensemble.feature_set.names();

        // The name-rule leak and the numerically identical column.
        assert!(!names.contains(&"ml_grade"));
        assert!(!names.contains(&"vertical_index"));
        // Present in 10% of rows: excluded no matter how predictive.
        assert!(!names.contains(&"rare_signal"));
        // Honest observables survive.
        assert!(names.contains(&"ppg"));

        assert!(output.exclusions.excluded.iter().any(|e| e.feature == "ml_grade"));
        assert!(output.exclusions.excluded.iter().any(|e| {
            e.feature == "vertical_index"
                && matches!(e.reason, crate::features::ExclusionReason::Correlation { .. })
        }));
        assert!(output
            .exclusions
            .excluded
            .iter()
            .any(|e| e.feature == "rare_signal"));
    }

    #[test]
    fn no_surviving_feature_correlates_past_the_hard_threshold() {
        let config = fast_config();
        let output = run(&synthetic_roster_csv(), &config);

        // Post-hoc audit over the final manifest: recompute correlations of
        // surviving raw columns against the target.
        let target: Vec<f64> = output.roster.target.iter().flatten().copied().collect();
        for column in &output.roster.columns {
            let name = column.name.as_str();
            if !output.ensemble.feature_set.names().contains(&name) {
                continue;
            }
            let pairs: Vec<(f64, f64)> = column
                .values
                .iter()
                .zip(&output.roster.target)
                .filter_map(|(v, t)| Some(((*v)?, (*t)?)))
                .collect();
            let xs: Vec<f64> = pairs.iter().map(|(x, _)| *x).collect();
            let ys: Vec<f64> = pairs.iter().map(|(_, y)| *y).collect();
            if let Some(corr) = crate::math::pearson(&xs, &ys) {
                assert!(
                    corr.abs() <= config.hard_corr + 1e-9,
                    "{name} survived with |corr|={:.3}",
                    corr.abs()
                );
            }
        }
        assert_eq!(target.len(), 60);
    }

    #[test]
    fn identical_seeds_reproduce_the_run_exactly() {
        let config = fast_config();
        let a = run(&synthetic_roster_csv(), &config);
        let b = run(&synthetic_roster_csv(), &config);

        assert_eq!(a.ensemble.feature_set.names(), b.ensemble.feature_set.names());
        assert_eq!(a.ensemble.weights.entries, b.ensemble.weights.entries);
        for (pa, pb) in a.predictions.iter().zip(&b.predictions) {
            assert_eq!(pa.predicted_rank, pb.predicted_rank);
        }
    }

    #[test]
    fn a_failing_family_leaves_a_working_renormalized_ensemble() {
        let mut config = fast_config();
        config.boost.learning_rate = f64::NAN;
        let output = run(&synthetic_roster_csv(), &config);

        assert_eq!(output.ensemble.models.len(), 3);
        assert!((output.ensemble.weights.sum() - 1.0).abs() < 1e-6);
        assert!(!output.ensemble.skipped.is_empty());
    }

    #[test]
    fn tiny_monotone_roster_ranks_correctly() {
        // Three prospects, two linear families, a single curved-but-monotone
        // performance score (better score, better rank). The hard threshold
        // is raised because three collinear-ish points always correlate.
        let csv = "name,ppg,actual_rank\nAce,95.0,1\nBeau,92.0,2\nCal,40.0,3\n";
        let mut config = fast_config();
        config.model_spec = ModelSelection::Linear;
        config.folds = 3;
        config.test_fraction = 0.0;
        config.hard_corr = 0.95;
        config.soft_corr = 0.9;
        config.tiers = vec![];

        let output = run(csv, &config);
        assert_eq!(output.ensemble.models.len(), 2);
        let rho = output.evaluation.ensemble.spearman.unwrap();
        assert!(rho > 0.9, "Spearman {rho} too low");
    }

    #[test]
    fn inference_only_rows_are_predicted_but_not_scored() {
        let mut csv = synthetic_roster_csv();
        csv.push_str("Undeclared Kid,PG,25.0,9.0,7.0,18.0,2.0,18,30,50.0,55.0,30.0,,\n");
        let config = fast_config();
        let output = run(&csv, &config);

        assert_eq!(output.predictions.len(), 61);
        let extra = output
            .predictions
            .iter()
            .find(|p| p.name == "Undeclared Kid")
            .unwrap();
        assert!(extra.actual_rank.is_none());
        assert!(extra.predicted_rank >= 1.0 && extra.predicted_rank <= 61.0);
        assert!(extra.abs_error.is_none());
        // Metrics never include the unranked row.
        assert!(output.eval_rows.iter().all(|&i| output.roster.target[i].is_some()));
    }
}
