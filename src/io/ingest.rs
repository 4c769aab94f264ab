//! CSV roster ingest and normalization.
//!
//! This module turns a heterogeneous prospect-list CSV into clean in-memory
//! records that are safe to classify and train on.
//!
//! Design goals:
//! - **Strict schema** for structural problems (missing target column is a
//!   clear error with exit code 3, not a silent empty run)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no classification or training logic here
//!
//! Physique columns quoted as text (`6-8`, `6'8"`) are converted to inches at
//! this boundary so everything downstream sees numbers.

use std::collections::HashMap;
use std::fs::File;

use crate::domain::{EngineConfig, ProspectRecord, RawColumn};
use crate::error::AppError;

/// Numeric attributes the engine recognizes up front. Columns outside this
/// list are still ingested (the classifier decides their fate); columns on
/// this list that are missing entirely are reported as schema exclusions.
pub const DECLARED_ATTRIBUTES: &[&str] = &[
    // College production
    "ppg",
    "rpg",
    "apg",
    "spg",
    "bpg",
    "turnovers",
    "fg_pct",
    "three_pt_pct",
    "ft_pct",
    "ts_pct",
    "usage_rate",
    "fga",
    "fta",
    "per",
    "win_shares",
    // Scouting evaluations
    "shooting_skill_score",
    "athleticism_score",
    "bbiq_score",
    "leadership_score",
    "defensive_upside",
    "defensive_rating",
    "offensive_rating",
    // Physique and availability
    "age",
    "weight",
    "games_played",
    "minutes",
    "games_started",
    // Team context
    "team_pace",
    "team_ranking",
    "conference_strength",
];

/// Text-form physique columns converted to `<name>_inches` at ingest.
pub const LENGTH_TEXT_ATTRIBUTES: &[&str] = &["height", "wingspan"];

/// Recognized ground-truth rank columns, in resolution order.
pub const TARGET_CANDIDATES: &[&str] = &["actual_rank", "rank", "draft_position"];

const IDENTITY_COLUMNS: &[&str] = &["id", "name", "position"];

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Summary stats about the rows actually used.
#[derive(Debug, Clone)]
pub struct RosterStats {
    pub n_records: usize,
    pub n_training: usize,
    pub rank_min: f64,
    pub rank_max: f64,
}

/// Ingest output: records, per-attribute columns, resolved target, row errors.
#[derive(Debug, Clone)]
pub struct RosterData {
    pub records: Vec<ProspectRecord>,
    /// One column per attribute present in the input, in header order.
    pub columns: Vec<RawColumn>,
    /// Declared attributes missing from the input header.
    pub absent: Vec<String>,
    /// Ground-truth rank per record, aligned with `records`.
    pub target: Vec<Option<f64>>,
    pub target_column: String,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub stats: RosterStats,
}

/// Load and normalize the roster CSV named by the config.
pub fn load_roster(config: &EngineConfig) -> Result<RosterData, AppError> {
    let file = File::open(&config.csv_path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open roster CSV '{}': {e}", config.csv_path.display()),
        )
    })?;
    read_roster(file, config)
}

/// Ingest from any reader (the file path only matters for error messages).
pub fn read_roster<R: std::io::Read>(
    reader: R,
    config: &EngineConfig,
) -> Result<RosterData, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let header_index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();

    let target_column = resolve_target_column(&header_index, config)?;

    // Attribute columns in header order, with text-length columns renamed to
    // their numeric form.
    let mut attribute_names: Vec<String> = Vec::new();
    for header in &headers {
        if IDENTITY_COLUMNS.contains(&header.as_str()) || header == &target_column {
            continue;
        }
        let name = if LENGTH_TEXT_ATTRIBUTES.contains(&header.as_str()) {
            format!("{header}_inches")
        } else {
            header.clone()
        };
        if !attribute_names.contains(&name) {
            attribute_names.push(name);
        }
    }

    let absent: Vec<String> = DECLARED_ATTRIBUTES
        .iter()
        .chain(LENGTH_TEXT_ATTRIBUTES)
        .filter(|a| !header_index.contains_key(**a))
        .map(|a| a.to_string())
        .collect();

    let rank_bound = config.roster_size.map(|n| n as f64);

    let mut records = Vec::new();
    let mut target = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (row_index, result) in csv_reader.records().enumerate() {
        rows_read += 1;
        let line = row_index + 2; // header is line 1
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("Unreadable row: {e}"),
                });
                continue;
            }
        };

        let name = match field(&header_index, &record, "name") {
            Some(n) => n.to_string(),
            None => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: "Missing prospect name.".to_string(),
                });
                continue;
            }
        };
        let id = field(&header_index, &record, "id")
            .map(String::from)
            .unwrap_or_else(|| format!("P{:03}", row_index + 1));
        let position = field(&header_index, &record, "position").map(|p| p.to_uppercase());

        let rank = field(&header_index, &record, &target_column).and_then(parse_numeric);
        if let (Some(rank), Some(bound)) = (rank, rank_bound) {
            if rank < 1.0 || rank > bound {
                row_errors.push(RowError {
                    line,
                    id: Some(id),
                    message: format!("Rank {rank} outside [1, {bound}]."),
                });
                continue;
            }
        }

        let mut attributes = HashMap::new();
        for header in &headers {
            if IDENTITY_COLUMNS.contains(&header.as_str()) || header == &target_column {
                continue;
            }
            let Some(raw) = field(&header_index, &record, header) else {
                continue;
            };
            if LENGTH_TEXT_ATTRIBUTES.contains(&header.as_str()) {
                if let Some(inches) = parse_length_inches(raw) {
                    attributes.insert(format!("{header}_inches"), inches);
                }
            } else if let Some(value) = parse_numeric(raw) {
                attributes.insert(header.clone(), value);
            }
            // Unparseable cells coerce to missing; the classifier's coverage
            // gate handles columns that are mostly junk.
        }

        records.push(ProspectRecord {
            id,
            name,
            position,
            attributes,
            actual_rank: rank,
        });
        target.push(rank);
    }

    if records.is_empty() {
        return Err(AppError::new(3, "Roster CSV contains no usable rows."));
    }

    let known: Vec<f64> = target.iter().flatten().copied().collect();
    if known.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "Target column '{target_column}' has no values; there is nothing to learn from."
            ),
        ));
    }

    let columns = attribute_names
        .iter()
        .map(|name| RawColumn {
            name: name.clone(),
            values: records
                .iter()
                .map(|r| r.attributes.get(name).copied())
                .collect(),
        })
        .collect();

    let stats = RosterStats {
        n_records: records.len(),
        n_training: known.len(),
        rank_min: known.iter().copied().fold(f64::INFINITY, f64::min),
        rank_max: known.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };

    Ok(RosterData {
        records,
        columns,
        absent,
        target,
        target_column,
        row_errors,
        rows_read,
        stats,
    })
}

/// Non-empty value of a named column in one row.
fn field<'r>(
    header_index: &HashMap<&str, usize>,
    record: &'r csv::StringRecord,
    name: &str,
) -> Option<&'r str> {
    header_index
        .get(name)
        .and_then(|&i| record.get(i))
        .filter(|v| !v.is_empty())
}

fn resolve_target_column(
    header_index: &HashMap<&str, usize>,
    config: &EngineConfig,
) -> Result<String, AppError> {
    if let Some(explicit) = &config.target_column {
        let lower = explicit.to_lowercase();
        if !header_index.contains_key(lower.as_str()) {
            return Err(AppError::new(
                2,
                format!("Target column '{explicit}' not found in the CSV header."),
            ));
        }
        return Ok(lower);
    }
    for candidate in TARGET_CANDIDATES {
        if header_index.contains_key(candidate) {
            return Ok(candidate.to_string());
        }
    }
    Err(AppError::new(
        3,
        format!(
            "No ground-truth rank column found (looked for {}).",
            TARGET_CANDIDATES.join(", ")
        ),
    ))
}

fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert `6-8`, `6'8"`, `6'8` or a plain number to inches.
pub fn parse_length_inches(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('"');
    if cleaned.is_empty() {
        return None;
    }

    if let Some((feet, inches)) = cleaned.split_once('-') {
        let feet: f64 = feet.trim().parse().ok()?;
        let inches: f64 = inches.trim().parse().ok()?;
        return Some(feet * 12.0 + inches);
    }
    if let Some((feet, inches)) = cleaned.split_once('\'') {
        let feet: f64 = feet.trim().parse().ok()?;
        let inches: f64 = if inches.trim().is_empty() {
            0.0
        } else {
            inches.trim().parse().ok()?
        };
        return Some(feet * 12.0 + inches);
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config() -> EngineConfig {
        EngineConfig::with_csv("unused.csv")
    }

    fn ingest(csv: &str, config: &EngineConfig) -> Result<RosterData, AppError> {
        read_roster(Cursor::new(csv.to_string()), config)
    }

    #[test]
    fn length_text_forms_convert_to_inches() {
        assert_eq!(parse_length_inches("6-8"), Some(80.0));
        assert_eq!(parse_length_inches("6'8\""), Some(80.0));
        assert_eq!(parse_length_inches("6'8"), Some(80.0));
        assert_eq!(parse_length_inches("7'"), Some(84.0));
        assert_eq!(parse_length_inches("80.5"), Some(80.5));
        assert_eq!(parse_length_inches("tall"), None);
        assert_eq!(parse_length_inches(""), None);
    }

    #[test]
    fn basic_roster_parses_records_and_columns() {
        let csv = "name,position,ppg,height,actual_rank\n\
                   Alice,PG,21.5,6-2,1\n\
                   Bob,C,9.0,7'0\",2\n";
        let roster = ingest(csv, &config()).unwrap();

        assert_eq!(roster.records.len(), 2);
        assert_eq!(roster.target_column, "actual_rank");
        assert_eq!(roster.records[0].actual_rank, Some(1.0));
        assert_eq!(roster.records[1].attributes["height_inches"], 84.0);

        let ppg = roster.columns.iter().find(|c| c.name == "ppg").unwrap();
        assert_eq!(ppg.values, vec![Some(21.5), Some(9.0)]);
    }

    #[test]
    fn declared_attributes_missing_from_header_are_reported() {
        let csv = "name,ppg,actual_rank\nAlice,20.0,1\nBob,10.0,2\n";
        let roster = ingest(csv, &config()).unwrap();
        assert!(roster.absent.contains(&"rpg".to_string()));
        assert!(roster.absent.contains(&"wingspan".to_string()));
        assert!(!roster.absent.contains(&"ppg".to_string()));
    }

    #[test]
    fn target_resolution_prefers_actual_rank_then_falls_back() {
        let csv = "name,ppg,rank\nAlice,20.0,1\n";
        let roster = ingest(csv, &config()).unwrap();
        assert_eq!(roster.target_column, "rank");

        let mut cfg = config();
        cfg.target_column = Some("rank".to_string());
        let roster = ingest("name,ppg,rank,actual_rank\nAlice,20.0,1,2\n", &cfg).unwrap();
        assert_eq!(roster.target_column, "rank");
        assert_eq!(roster.records[0].actual_rank, Some(1.0));
    }

    #[test]
    fn missing_target_column_is_fatal() {
        let csv = "name,ppg\nAlice,20.0\n";
        let err = ingest(csv, &config()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn target_column_with_no_values_is_fatal() {
        let csv = "name,ppg,actual_rank\nAlice,20.0,\nBob,10.0,\n";
        let err = ingest(csv, &config()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn rows_without_names_are_skipped_with_an_error() {
        let csv = "name,ppg,actual_rank\n,20.0,1\nBob,10.0,2\n";
        let roster = ingest(csv, &config()).unwrap();
        assert_eq!(roster.records.len(), 1);
        assert_eq!(roster.row_errors.len(), 1);
        assert_eq!(roster.row_errors[0].line, 2);
    }

    #[test]
    fn ranks_outside_the_roster_bound_are_row_errors() {
        let mut cfg = config();
        cfg.roster_size = Some(60);
        let csv = "name,ppg,actual_rank\nAlice,20.0,1\nBob,10.0,75\n";
        let roster = ingest(csv, &cfg).unwrap();
        assert_eq!(roster.records.len(), 1);
        assert!(roster.row_errors[0].message.contains("outside"));
    }

    #[test]
    fn rows_without_targets_become_inference_rows() {
        let csv = "name,ppg,actual_rank\nAlice,20.0,1\nBob,10.0,\n";
        let roster = ingest(csv, &config()).unwrap();
        assert_eq!(roster.records.len(), 2);
        assert_eq!(roster.stats.n_training, 1);
        assert_eq!(roster.target[1], None);
    }

    #[test]
    fn junk_cells_coerce_to_missing() {
        let csv = "name,ppg,actual_rank\nAlice,abc,1\nBob,10.0,2\n";
        let roster = ingest(csv, &config()).unwrap();
        let ppg = roster.columns.iter().find(|c| c.name == "ppg").unwrap();
        assert_eq!(ppg.values, vec![None, Some(10.0)]);
    }
}
