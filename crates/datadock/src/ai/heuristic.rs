//! Rule-based schema inference: header detection, per-column type voting
//! and period-column discovery over a bounded sample of rows.

use crate::error::InferenceError;
use crate::period::{parse_period, PeriodGrain};
use crate::reader::TableData;
use crate::schema::{canonicalize_column, ColumnSchema, ColumnType};

use super::{InferredSchema, SchemaInference};

/// Rows inspected per column when voting on a type.
const SAMPLE_LIMIT: usize = 200;

/// Fraction of sampled values that must parse as periods for a column to
/// qualify as the period column.
const PERIOD_THRESHOLD: f64 = 0.8;

/// Canonical name fragments that mark a column as period-like.
const PERIOD_NAME_HINTS: &[&str] = &["date", "period", "month", "year", "quarter", "week", "day"];

#[derive(Debug, Default)]
pub struct HeuristicInference;

impl HeuristicInference {
    pub fn new() -> Self {
        Self
    }
}

impl SchemaInference for HeuristicInference {
    fn infer(&self, table: &TableData) -> Result<InferredSchema, InferenceError> {
        let width = table.column_count();
        if width == 0 {
            return Err(InferenceError::EmptyTable);
        }

        let has_header_row = looks_like_header(&table.records[0]);
        let data_rows: &[Vec<String>] = if has_header_row {
            &table.records[1..]
        } else {
            &table.records[..]
        };

        let names = column_names(table, width, has_header_row);
        let mut columns = Vec::with_capacity(width);
        let mut period_candidates: Vec<(usize, PeriodGrain)> = Vec::new();

        for (idx, name) in names.iter().enumerate() {
            let sample: Vec<&str> = data_rows
                .iter()
                .take(SAMPLE_LIMIT)
                .filter_map(|row| row.get(idx))
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect();

            let data_type = vote_column_type(&sample);
            if let Some(grain) = period_candidate(name, data_type, &sample) {
                period_candidates.push((idx, grain));
            }
            columns.push(ColumnSchema::new(name.as_str(), data_type));
        }

        let period_column = pick_period_column(&names, &period_candidates);
        let confidence = score_confidence(&columns, has_header_row, period_column.is_some());

        Ok(InferredSchema {
            table_name: propose_table_name(table),
            columns,
            period_column,
            has_header_row,
            confidence,
        })
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// A first row is a header when every non-empty cell is non-numeric and
/// none parses as a calendar date. All-text tables therefore get a header,
/// all-year first rows do not.
fn looks_like_header(first_row: &[String]) -> bool {
    let cells: Vec<&str> = first_row
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if cells.is_empty() {
        return false;
    }
    cells
        .iter()
        .all(|cell| cell.parse::<f64>().is_err() && parse_period(cell).is_none())
}

/// Canonical, de-duplicated column names. Header cells that canonicalize
/// to nothing and synthesized names both use the 1-based position.
fn column_names(table: &TableData, width: usize, has_header_row: bool) -> Vec<String> {
    let mut names = Vec::with_capacity(width);
    let mut seen = std::collections::HashSet::new();
    for idx in 0..width {
        let mut name = if has_header_row {
            table.records[0]
                .get(idx)
                .map(|cell| canonicalize_column(cell))
                .unwrap_or_default()
        } else {
            String::new()
        };
        if name.is_empty() {
            name = format!("column_{}", idx + 1);
        }
        if !seen.insert(name.clone()) {
            let mut suffix = 2;
            while !seen.insert(format!("{name}_{suffix}")) {
                suffix += 1;
            }
            name = format!("{name}_{suffix}");
        }
        names.push(name);
    }
    names
}

/// Strictest type every sampled value satisfies, checked narrow to wide.
fn vote_column_type(sample: &[&str]) -> ColumnType {
    if sample.is_empty() {
        return ColumnType::Text;
    }
    if sample.iter().all(|v| v.parse::<i64>().is_ok()) {
        return ColumnType::Integer;
    }
    if sample.iter().all(|v| v.parse::<f64>().is_ok()) {
        return ColumnType::Float;
    }
    if sample.iter().all(|v| is_bool_literal(v)) {
        return ColumnType::Boolean;
    }
    if sample.iter().all(|v| parse_period(v).is_some()) {
        return ColumnType::Date;
    }
    ColumnType::Text
}

fn is_bool_literal(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no"
    )
}

/// Returns the dominant grain when the column qualifies as a period
/// candidate. Integer columns qualify only with a period-like name or
/// plausible year values, so ordinary numeric columns stay out.
fn period_candidate(name: &str, data_type: ColumnType, sample: &[&str]) -> Option<PeriodGrain> {
    if sample.is_empty() {
        return None;
    }
    let parsed: Vec<_> = sample.iter().filter_map(|v| parse_period(v)).collect();
    let fraction = parsed.len() as f64 / sample.len() as f64;
    if fraction < PERIOD_THRESHOLD {
        return None;
    }
    if data_type == ColumnType::Integer
        && !has_period_hint(name)
        && !parsed
            .iter()
            .all(|p| (1900..=2100).contains(&chrono::Datelike::year(&p.start())))
    {
        return None;
    }
    parsed.first().map(|p| p.grain())
}

fn has_period_hint(name: &str) -> bool {
    name.split('_')
        .any(|token| PERIOD_NAME_HINTS.contains(&token))
}

/// Prefers a candidate with a period-like name, otherwise the leftmost.
fn pick_period_column(names: &[String], candidates: &[(usize, PeriodGrain)]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let hinted = candidates
        .iter()
        .find(|(idx, _)| has_period_hint(&names[*idx]));
    let (idx, _) = hinted.unwrap_or(&candidates[0]);
    Some(names[*idx].clone())
}

fn score_confidence(columns: &[ColumnSchema], has_header: bool, has_period: bool) -> f32 {
    let typed = columns
        .iter()
        .filter(|c| c.data_type != ColumnType::Text)
        .count();
    let type_share = if columns.is_empty() {
        0.0
    } else {
        typed as f32 / columns.len() as f32
    };
    let mut confidence = 0.5 + 0.3 * type_share;
    if has_header {
        confidence += 0.15;
    }
    if has_period {
        confidence += 0.05;
    }
    confidence.min(1.0)
}

fn propose_table_name(table: &TableData) -> String {
    let stem = table
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| table.file_name.clone());
    let mut name = canonicalize_column(&stem);
    name.truncate(64);
    if name.is_empty() {
        name = "dataset".to_string();
    }
    name
}
