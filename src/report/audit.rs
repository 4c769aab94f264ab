//! Audit report writer.
//!
//! The run always produces a readable account of what was dropped and why;
//! this module writes that account to a markdown file so the decisions
//! survive the terminal session.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::Local;

use crate::domain::{EngineConfig, ModelKind};
use crate::error::AppError;
use crate::features::ExclusionReport;
use crate::io::ingest::RosterData;

pub fn write_audit_report(
    path: &Path,
    roster: &RosterData,
    report: &ExclusionReport,
    skipped_models: &[(ModelKind, String)],
    config: &EngineConfig,
) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(2, format!("Failed to create audit report '{}': {e}", path.display()))
    })?;

    let mut body = String::new();
    body.push_str("# prospect audit report\n");
    body.push_str(&format!("- generated: {}\n", Local::now().to_rfc3339()));
    body.push_str(&format!("- roster: {}\n", config.csv_path.display()));
    body.push_str(&format!(
        "- records: {} read, {} used, {} with known rank\n",
        roster.rows_read, roster.stats.n_records, roster.stats.n_training
    ));
    body.push_str(&format!("- target column: {}\n", roster.target_column));
    body.push_str(&format!(
        "- thresholds: hard_corr={:.2}, soft_corr={:.2}, min_coverage={:.2}\n",
        config.hard_corr, config.soft_corr, config.min_coverage
    ));
    body.push_str(&format!("- seed: {}\n", config.seed));

    body.push_str("\n## Excluded features\n");
    if report.excluded.is_empty() {
        body.push_str("(none)\n");
    }
    for exclusion in &report.excluded {
        body.push_str(&format!(
            "- `{}` — {}: {}\n",
            exclusion.feature,
            exclusion.reason.label(),
            exclusion.reason.detail(),
        ));
    }

    body.push_str("\n## Proxy warnings (kept)\n");
    if report.warnings.is_empty() {
        body.push_str("(none)\n");
    }
    for warning in &report.warnings {
        body.push_str(&format!(
            "- `{}` — |corr|={:.3} with the target\n",
            warning.feature,
            warning.correlation.abs(),
        ));
    }

    body.push_str("\n## Skipped model families\n");
    if skipped_models.is_empty() {
        body.push_str("(none)\n");
    }
    for (kind, reason) in skipped_models {
        body.push_str(&format!("- {} — {reason}\n", kind.display_name()));
    }

    body.push_str("\n## Row errors\n");
    if roster.row_errors.is_empty() {
        body.push_str("(none)\n");
    }
    for error in &roster.row_errors {
        let id = error.id.as_deref().unwrap_or("?");
        body.push_str(&format!("- line {} ({id}): {}\n", error.line, error.message));
    }

    file.write_all(body.as_bytes())
        .map_err(|e| AppError::new(2, format!("Failed to write audit report: {e}")))?;

    Ok(())
}
