//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/training code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{EngineConfig, PredictionRecord};
use crate::features::ExclusionReport;
use crate::io::ingest::RosterData;
use crate::report::metrics::{DominanceFlag, Evaluation};
use crate::train::TrainedEnsemble;

/// Format the full run summary: roster stats, model diagnostics, weights,
/// ensemble metrics, tier table and importance ranking.
pub fn format_run_summary(
    roster: &RosterData,
    ensemble: &TrainedEnsemble,
    evaluation: &Evaluation,
    exclusions: &ExclusionReport,
    config: &EngineConfig,
) -> String {
    let mut out = String::new();

    out.push_str("=== prospect - Prospect Ranking Ensemble ===\n");
    out.push_str(&format!("Roster: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Records: {} ({} with known rank) | target '{}' in [{:.0}, {:.0}]\n",
        roster.stats.n_records,
        roster.stats.n_training,
        roster.target_column,
        roster.stats.rank_min,
        roster.stats.rank_max,
    ));
    out.push_str(&format!(
        "Features: {} survived | {} excluded | {} proxy warnings\n",
        ensemble.feature_set.len(),
        exclusions.excluded.len(),
        exclusions.warnings.len(),
    ));
    out.push_str(&format!(
        "Seed: {} | folds: {} | test fraction: {:.2}\n",
        config.seed, config.folds, config.test_fraction,
    ));
    if !roster.row_errors.is_empty() {
        out.push_str(&format!("Row errors: {} (see audit report)\n", roster.row_errors.len()));
    }

    out.push_str("\nModel diagnostics (cross-validation):\n");
    for result in &ensemble.cv {
        let weight = ensemble.weights.get(result.model).unwrap_or(0.0);
        out.push_str(&format!(
            "  {:<18} MAE={:>6.2} (±{:.2})  weight={:.3}\n",
            result.model.display_name(),
            result.mean_mae,
            result.std_mae,
            weight,
        ));
    }
    for (kind, reason) in &ensemble.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }

    out.push_str(&format!("\nEnsemble on evaluation set (n={}):\n", evaluation.ensemble.n));
    out.push_str(&format!(
        "  MAE={:.2}  RMSE={:.2}  R²={}  Spearman={}\n",
        evaluation.ensemble.mae,
        evaluation.ensemble.rmse,
        fmt_opt(evaluation.ensemble.r2),
        fmt_opt(evaluation.ensemble.spearman),
    ));
    out.push_str(&format!(
        "  abs error: median={:.2} mean={:.2} max={:.2} | within 5: {:.0}% | within 10: {:.0}%\n",
        evaluation.distribution.median_abs,
        evaluation.distribution.mean_abs,
        evaluation.distribution.max_abs,
        evaluation.distribution.within_5 * 100.0,
        evaluation.distribution.within_10 * 100.0,
    ));

    out.push_str("\nPer-model test metrics:\n");
    for (kind, metrics) in &evaluation.per_model {
        out.push_str(&format!(
            "  {:<18} MAE={:>6.2}  RMSE={:>6.2}  R²={}  Spearman={}\n",
            kind.display_name(),
            metrics.mae,
            metrics.rmse,
            fmt_opt(metrics.r2),
            fmt_opt(metrics.spearman),
        ));
    }

    if !evaluation.tiers.is_empty() {
        out.push_str("\nTier breakdown:\n");
        for tier in &evaluation.tiers {
            out.push_str(&format!(
                "  {:<14} (picks {:>2.0}-{:>2.0})  MAE={:>6.2}  n={}\n",
                tier.label, tier.lo, tier.hi, tier.mae, tier.count,
            ));
        }
    }

    if !evaluation.importance.is_empty() {
        out.push_str("\nTop features by forest importance:\n");
        for (name, share) in evaluation.importance.iter().take(10) {
            out.push_str(&format!("  {:<28} {:>6.1}%\n", name, share * 100.0));
        }
    }
    match &evaluation.dominance {
        DominanceFlag::Strong { feature, share } => {
            out.push_str(&format!(
                "\n!! '{feature}' carries {:.0}% of importance: strong dominance risk\n",
                share * 100.0
            ));
        }
        DominanceFlag::Moderate { feature, share } => {
            out.push_str(&format!(
                "\n! '{feature}' carries {:.0}% of importance: watch for dominance\n",
                share * 100.0
            ));
        }
        DominanceFlag::None => {}
    }

    out
}

/// Best and worst individual calls for qualitative review.
pub fn format_review_tables(evaluation: &Evaluation) -> String {
    let mut out = String::new();

    out.push_str("Best calls (lowest absolute error):\n");
    out.push_str(&format_prediction_table(&evaluation.best));
    out.push('\n');

    out.push_str("Worst calls (highest absolute error):\n");
    out.push_str(&format_prediction_table(&evaluation.worst));

    out
}

/// The full board, ordered by predicted rank.
pub fn format_board(predictions: &[PredictionRecord]) -> String {
    let mut sorted: Vec<&PredictionRecord> = predictions.iter().collect();
    sorted.sort_by(|a, b| {
        a.predicted_rank
            .partial_cmp(&b.predicted_rank)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = String::new();
    out.push_str(&format!(
        "{:<4} {:<24} {:<4} {:>9} {:>7} {:>7}\n",
        "#", "name", "pos", "predicted", "actual", "error"
    ));
    out.push_str(&format!(
        "{:-<4} {:-<24} {:-<4} {:->9} {:->7} {:->7}\n",
        "", "", "", "", "", ""
    ));
    for (slot, p) in sorted.iter().enumerate() {
        out.push_str(&format!(
            "{:<4} {:<24} {:<4} {:>9.1} {:>7} {:>7}\n",
            slot + 1,
            truncate(&p.name, 24),
            p.position.as_deref().unwrap_or(""),
            p.predicted_rank,
            fmt_opt_short(p.actual_rank),
            fmt_opt_short(p.abs_error),
        ));
    }
    out
}

/// The exclusion story, for the audit subcommand.
pub fn format_exclusions(report: &ExclusionReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("Excluded features: {}\n", report.excluded.len()));
    for exclusion in &report.excluded {
        out.push_str(&format!(
            "  {:<28} {:<20} {}\n",
            exclusion.feature,
            exclusion.reason.label(),
            exclusion.reason.detail(),
        ));
    }

    if !report.warnings.is_empty() {
        out.push_str(&format!("\nProxy warnings: {}\n", report.warnings.len()));
        for warning in &report.warnings {
            out.push_str(&format!(
                "  {:<28} |corr|={:.3} with the target (kept)\n",
                warning.feature,
                warning.correlation.abs(),
            ));
        }
    }

    out
}

fn format_prediction_table(rows: &[PredictionRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  {:<24} {:>7} {:>9} {:>7}\n",
        "name", "actual", "predicted", "error"
    ));
    for p in rows {
        out.push_str(&format!(
            "  {:<24} {:>7} {:>9.1} {:>7}\n",
            truncate(&p.name, 24),
            fmt_opt_short(p.actual_rank),
            p.predicted_rank,
            fmt_opt_short(p.abs_error),
        ));
    }
    out
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.3}"),
        None => "n/a".to_string(),
    }
}

fn fmt_opt_short(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.1}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
