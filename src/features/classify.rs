//! Feature classification: observable vs outcome-derived vs unusable.
//!
//! Two independent leakage tests, both declarative and cheap:
//!
//! 1. **Name rules** — columns named after ranks, picks, prior-model scores,
//!    probabilities or grades are outputs of some scoring process and are
//!    rejected outright, whatever their numbers look like.
//! 2. **Correlation** — a column whose |Pearson correlation| with the target
//!    exceeds the hard threshold is rejected; the soft-to-hard band is kept
//!    with a proxy warning so auditors can judge.
//!
//! Coverage below the configured minimum makes a column unusable regardless
//! of how predictive it is. None of this is fatal.

use crate::domain::{EngineConfig, FeatureDescriptor, Provenance, RawColumn};
use crate::features::{ExclusionReason, ExclusionReport, FeatureColumn};
use crate::math::pearson;

/// A single name-based leakage rule.
///
/// `Token` matches a whole underscore-delimited word ("rank" hits
/// `actual_rank` but not `team_ranking`); `Contains` matches a raw substring
/// (for versioned artifacts like `score_v22`).
#[derive(Debug, Clone, Copy)]
pub enum NameRule {
    Token(&'static str),
    Contains(&'static str),
}

/// Default rules for columns that encode the outcome itself.
pub const OUTCOME_NAME_RULES: &[NameRule] = &[
    NameRule::Token("rank"),
    NameRule::Token("draft"),
    NameRule::Token("pick"),
    NameRule::Token("round"),
    NameRule::Token("probability"),
    NameRule::Token("predicted"),
    NameRule::Token("prediction"),
    NameRule::Token("projected"),
    NameRule::Token("projection"),
    NameRule::Token("consensus"),
    NameRule::Token("mock"),
    NameRule::Token("grade"),
    NameRule::Contains("final_score"),
    NameRule::Contains("base_score"),
    NameRule::Contains("score_v"),
    NameRule::Contains("ml_"),
];

/// Pure rule evaluation: the first matching rule's pattern, if any.
pub fn matches_outcome_rule(name: &str, rules: &[NameRule]) -> Option<&'static str> {
    let lower = name.to_lowercase();
    for rule in rules {
        match *rule {
            NameRule::Token(token) => {
                if lower.split('_').any(|part| part == token) {
                    return Some(token);
                }
            }
            NameRule::Contains(pattern) => {
                if lower.contains(pattern) {
                    return Some(pattern);
                }
            }
        }
    }
    None
}

/// Output of classifying the raw roster columns.
#[derive(Debug, Clone)]
pub struct ClassifiedFeatures {
    pub survivors: Vec<FeatureColumn>,
    pub report: ExclusionReport,
}

/// Classify every ingested column against the target.
///
/// `absent` lists declared attributes missing from the input header; they are
/// recorded as schema exclusions so the caller sees the full picture.
pub fn classify_columns(
    columns: &[RawColumn],
    absent: &[String],
    target: &[Option<f64>],
    config: &EngineConfig,
) -> ClassifiedFeatures {
    let mut report = ExclusionReport::default();

    for name in absent {
        report.exclude(name.clone(), ExclusionReason::Schema);
    }

    let mut survivors = Vec::new();
    for column in columns {
        if let Some(feature) =
            gate_column(column, Provenance::Observable, target, config, &mut report)
        {
            survivors.push(feature);
        }
    }

    ClassifiedFeatures { survivors, report }
}

/// Run one column through the shared gates.
///
/// Used for raw attributes and again for every synthesized signal (a derived
/// feature can leak even when its inputs did not).
pub fn gate_column(
    column: &RawColumn,
    provenance: Provenance,
    target: &[Option<f64>],
    config: &EngineConfig,
    report: &mut ExclusionReport,
) -> Option<FeatureColumn> {
    let coverage = column.coverage();
    if coverage == 0.0 {
        report.exclude(column.name.clone(), ExclusionReason::Schema);
        return None;
    }

    if provenance == Provenance::Observable {
        if let Some(pattern) = matches_outcome_rule(&column.name, OUTCOME_NAME_RULES) {
            report.exclude(
                column.name.clone(),
                ExclusionReason::Denylist {
                    pattern: pattern.to_string(),
                },
            );
            return None;
        }
    }

    if coverage < config.min_coverage {
        report.exclude(
            column.name.clone(),
            ExclusionReason::Coverage { fraction: coverage },
        );
        return None;
    }

    if let Some(corr) = target_correlation(&column.values, target) {
        if corr.abs() > config.hard_corr {
            report.exclude(
                column.name.clone(),
                ExclusionReason::Correlation { value: corr },
            );
            return None;
        }
        if corr.abs() > config.soft_corr {
            report.warn_proxy(column.name.clone(), corr);
        }
    }

    Some(FeatureColumn {
        descriptor: FeatureDescriptor {
            name: column.name.clone(),
            provenance,
            coverage,
        },
        values: column.values.clone(),
    })
}

/// Pearson correlation over rows where both the feature and target are known.
fn target_correlation(values: &[Option<f64>], target: &[Option<f64>]) -> Option<f64> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (v, t) in values.iter().zip(target) {
        if let (Some(v), Some(t)) = (v, t) {
            xs.push(*v);
            ys.push(*t);
        }
    }
    pearson(&xs, &ys)
}
