//! Derived signal synthesis from observable attributes.
//!
//! Each signal is created only when every input it needs survived
//! classification; a partial schema simply yields fewer derived columns.
//! Denominators are stabilized with the configured epsilon, and cohort
//! signals divide by the mean over the same position group so bigs are
//! compared with bigs and guards with guards.
//!
//! Every derived column goes back through the classifier's gates: a
//! synthesized signal can correlate with the outcome even when none of its
//! inputs do.

use std::collections::HashMap;

use crate::domain::{EngineConfig, Provenance, ProspectRecord, RawColumn};
use crate::features::{classify::gate_column, ExclusionReport, FeatureColumn};

/// Age at which remaining development time is considered spent.
const DEVELOPMENT_CEILING_AGE: f64 = 22.0;

/// Reference possessions-per-game for pace adjustment.
const REFERENCE_PACE: f64 = 100.0;

/// Synthesize derived columns and gate each one.
///
/// Survivors are appended to the exclusion report's story like any raw
/// column; the returned list contains only the columns that passed.
pub fn synthesize_features(
    survivors: &[FeatureColumn],
    records: &[ProspectRecord],
    target: &[Option<f64>],
    config: &EngineConfig,
    report: &mut ExclusionReport,
) -> Vec<FeatureColumn> {
    let source = ColumnView::new(survivors);
    let eps = config.epsilon;
    let n = records.len();

    let mut candidates: Vec<RawColumn> = Vec::new();

    if let Some(col) = source.ratio(n, "efficiency_ratio", "ppg", "fga", eps) {
        candidates.push(col);
    }
    if let Some(col) = source.ratio(n, "playmaking_ratio", "apg", "turnovers", eps) {
        candidates.push(col);
    }
    if let Some(col) = source.average(n, "two_way_impact", &["ppg", "rpg", "apg", "spg", "bpg"]) {
        candidates.push(col);
    }
    if let Some(col) = source.map2(n, "pace_adjusted_ppg", "ppg", "team_pace", |ppg, pace| {
        ppg * REFERENCE_PACE / (pace + eps)
    }) {
        candidates.push(col);
    }
    if let Some(col) = source.ratio(n, "minutes_efficiency", "ppg", "minutes", eps) {
        candidates.push(col);
    }
    if let Some(col) = source.map2(n, "age_adjusted_production", "ppg", "age", |ppg, age| {
        ppg * (DEVELOPMENT_CEILING_AGE - age)
    }) {
        candidates.push(col);
    }
    if let Some(col) = source.cohort_relative(n, "ppg_vs_position", "ppg", records, eps) {
        candidates.push(col);
    }
    if let Some(col) = source.cohort_relative(n, "ts_vs_position", "ts_pct", records, eps) {
        candidates.push(col);
    }
    if let Some(col) = source.average(
        n,
        "skill_composite",
        &["shooting_skill_score", "athleticism_score", "bbiq_score"],
    ) {
        candidates.push(col);
    }
    if let Some(col) = source.sum(n, "production_volume", &["ppg", "rpg", "apg"]) {
        candidates.push(col);
    }
    if let Some(col) = source.map2(n, "scoring_volume_efficiency", "ts_pct", "fga", |ts, fga| {
        ts * fga
    }) {
        candidates.push(col);
    }
    if let Some(col) = source.map2(
        n,
        "reach_advantage",
        "wingspan_inches",
        "height_inches",
        |wingspan, height| wingspan - height,
    ) {
        candidates.push(col);
    }

    // A candidate whose inputs never co-occur on any row carries nothing;
    // dropping it here keeps the exclusion report about real decisions.
    candidates.retain(|col| col.values.iter().any(Option::is_some));

    candidates
        .iter()
        .filter_map(|col| gate_column(col, Provenance::Derived, target, config, report))
        .collect()
}

/// Read-only lookup over surviving columns.
struct ColumnView<'a> {
    by_name: HashMap<&'a str, &'a FeatureColumn>,
}

impl<'a> ColumnView<'a> {
    fn new(survivors: &'a [FeatureColumn]) -> Self {
        let by_name = survivors
            .iter()
            .map(|c| (c.descriptor.name.as_str(), c))
            .collect();
        Self { by_name }
    }

    fn get(&self, name: &str) -> Option<&'a FeatureColumn> {
        self.by_name.get(name).copied()
    }

    /// `a / (b + eps)` per row.
    fn ratio(&self, n: usize, name: &str, num: &str, den: &str, eps: f64) -> Option<RawColumn> {
        self.map2(n, name, num, den, |a, b| a / (b + eps))
    }

    /// Apply a binary function where both inputs are present.
    fn map2(
        &self,
        n: usize,
        name: &str,
        left: &str,
        right: &str,
        f: impl Fn(f64, f64) -> f64,
    ) -> Option<RawColumn> {
        let left = self.get(left)?;
        let right = self.get(right)?;
        let values = (0..n)
            .map(|i| match (left.values[i], right.values[i]) {
                (Some(a), Some(b)) => {
                    let v = f(a, b);
                    v.is_finite().then_some(v)
                }
                _ => None,
            })
            .collect();
        Some(RawColumn {
            name: name.to_string(),
            values,
        })
    }

    /// Mean across the named inputs; rows missing any input stay missing.
    fn average(&self, n: usize, name: &str, inputs: &[&str]) -> Option<RawColumn> {
        let col = self.sum(n, name, inputs)?;
        let k = inputs.len() as f64;
        Some(RawColumn {
            name: col.name,
            values: col.values.iter().map(|v| v.map(|s| s / k)).collect(),
        })
    }

    fn sum(&self, n: usize, name: &str, inputs: &[&str]) -> Option<RawColumn> {
        let cols: Option<Vec<&FeatureColumn>> = inputs.iter().map(|i| self.get(i)).collect();
        let cols = cols?;
        let values = (0..n)
            .map(|i| {
                let mut acc = 0.0;
                for col in &cols {
                    acc += col.values[i]?;
                }
                Some(acc)
            })
            .collect();
        Some(RawColumn {
            name: name.to_string(),
            values,
        })
    }

    /// Value divided by the mean of the same position cohort.
    ///
    /// Cohort means are computed over rows that have both a position and a
    /// value; rows without a position stay missing.
    fn cohort_relative(
        &self,
        n: usize,
        name: &str,
        input: &str,
        records: &[ProspectRecord],
        eps: f64,
    ) -> Option<RawColumn> {
        let col = self.get(input)?;

        let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            if let (Some(position), Some(value)) = (record.position.as_deref(), col.values[i]) {
                let entry = sums.entry(position).or_insert((0.0, 0));
                entry.0 += value;
                entry.1 += 1;
            }
        }

        let values = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let position = record.position.as_deref()?;
                let value = col.values[i]?;
                let (sum, count) = sums.get(position)?;
                let mean = sum / *count as f64;
                let v = value / (mean + eps);
                v.is_finite().then_some(v)
            })
            .collect();

        Some(RawColumn {
            name: name.to_string(),
            values,
        })
    }
}
