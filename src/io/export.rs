//! Export the predictions table to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or the display
//! layer: one row per prospect, stable column names, per-model
//! sub-predictions at the end.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{ModelKind, PredictionRecord};
use crate::error::AppError;

/// Write per-prospect predictions to a CSV file.
///
/// `model_order` fixes the sub-prediction columns (the surviving families in
/// training order), so the header does not depend on which map iteration
/// order produced the records.
pub fn write_predictions_csv(
    path: &Path,
    predictions: &[PredictionRecord],
    model_order: &[ModelKind],
) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create predictions CSV '{}': {e}", path.display()),
        )
    })?;

    let model_headers: Vec<String> = model_order
        .iter()
        .map(|kind| format!("{}_pred", column_name(*kind)))
        .collect();
    writeln!(
        file,
        "id,name,position,actual_rank,predicted_rank,abs_error,{}",
        model_headers.join(",")
    )
    .map_err(|e| AppError::new(2, format!("Failed to write predictions CSV header: {e}")))?;

    for p in predictions {
        let sub: Vec<String> = model_order
            .iter()
            .map(|kind| {
                p.by_model
                    .iter()
                    .find(|(k, _)| k == kind)
                    .map(|(_, v)| format!("{v:.4}"))
                    .unwrap_or_default()
            })
            .collect();
        writeln!(
            file,
            "{},{},{},{},{:.4},{},{}",
            escape(&p.id),
            escape(&p.name),
            p.position.as_deref().map(escape).unwrap_or_default(),
            p.actual_rank.map(|v| format!("{v:.0}")).unwrap_or_default(),
            p.predicted_rank,
            p.abs_error.map(|v| format!("{v:.4}")).unwrap_or_default(),
            sub.join(","),
        )
        .map_err(|e| AppError::new(2, format!("Failed to write predictions CSV row: {e}")))?;
    }

    Ok(())
}

fn column_name(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Forest => "forest",
        ModelKind::Boost => "boost",
        ModelKind::Ridge => "ridge",
        ModelKind::Lasso => "lasso",
    }
}

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
