//! Classifies incoming period values against the latest period already
//! loaded into a target dataset.

use serde::{Deserialize, Serialize};

use crate::period::parse::{ParsedPeriods, PeriodValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    NewData,
    FullDuplicate,
    PartialOverlap,
}

impl DuplicateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewData => "new_data",
            Self::FullDuplicate => "full_duplicate",
            Self::PartialOverlap => "partial_overlap",
        }
    }
}

impl std::fmt::Display for DuplicateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Duplicate classification evidence, part of the incremental-load decision
/// packet. Range fields hold the original period spellings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResult {
    pub status: DuplicateStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_last_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_first_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_last_value: Option<String>,
    /// Incoming rows whose period is not after the existing last period.
    pub overlapping_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_end: Option<String>,
    /// First strictly-new period value; appends start here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append_from: Option<String>,
    /// Values no period format accepted. Excluded from the comparison but
    /// never dropped silently.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unparsed_values: Vec<String>,
}

/// Classifies in priority order: NEW_DATA when nothing was loaded before or
/// every parsed value lies strictly after the existing last period, then
/// FULL_DUPLICATE when no value does, then PARTIAL_OVERLAP. An empty parsed
/// set counts as new data with the gap called out in the message.
pub fn detect(existing_last: Option<&PeriodValue>, parsed: &ParsedPeriods) -> DuplicateResult {
    let periods = &parsed.periods;
    let new_first = periods.first().map(|p| p.raw().to_string());
    let new_last = periods.last().map(|p| p.raw().to_string());

    let last = match existing_last {
        Some(last) => last,
        None => {
            return DuplicateResult {
                status: DuplicateStatus::NewData,
                message: format!(
                    "Target has no recorded period; treating all {} period values as new",
                    periods.len()
                ),
                existing_last_value: None,
                new_first_value: new_first,
                new_last_value: new_last,
                overlapping_rows: 0,
                overlap_start: None,
                overlap_end: None,
                append_from: None,
                unparsed_values: parsed.unparsed.clone(),
            };
        }
    };

    if periods.is_empty() {
        let message = if parsed.unparsed.is_empty() {
            "No period values present; treating file as new data".to_string()
        } else {
            format!(
                "No parseable period values ({} unparsable); treating file as new data",
                parsed.unparsed.len()
            )
        };
        return DuplicateResult {
            status: DuplicateStatus::NewData,
            message,
            existing_last_value: Some(last.raw().to_string()),
            new_first_value: None,
            new_last_value: None,
            overlapping_rows: 0,
            overlap_start: None,
            overlap_end: None,
            append_from: None,
            unparsed_values: parsed.unparsed.clone(),
        };
    }

    let overlapping_rows = periods.iter().filter(|p| *p <= last).count();

    if overlapping_rows == 0 {
        return DuplicateResult {
            status: DuplicateStatus::NewData,
            message: format!(
                "All {} period values are after the latest recorded period '{}'",
                periods.len(),
                last.raw()
            ),
            existing_last_value: Some(last.raw().to_string()),
            new_first_value: new_first,
            new_last_value: new_last,
            overlapping_rows: 0,
            overlap_start: None,
            overlap_end: None,
            append_from: None,
            unparsed_values: parsed.unparsed.clone(),
        };
    }

    if overlapping_rows == periods.len() {
        return DuplicateResult {
            status: DuplicateStatus::FullDuplicate,
            message: format!(
                "All {} period values fall within already loaded data (latest recorded period '{}')",
                periods.len(),
                last.raw()
            ),
            existing_last_value: Some(last.raw().to_string()),
            new_first_value: new_first.clone(),
            new_last_value: new_last,
            overlapping_rows,
            overlap_start: new_first,
            overlap_end: periods.last().map(|p| p.raw().to_string()),
            append_from: None,
            unparsed_values: parsed.unparsed.clone(),
        };
    }

    let append_from = periods
        .iter()
        .find(|p| *p > last)
        .map(|p| p.raw().to_string());
    DuplicateResult {
        status: DuplicateStatus::PartialOverlap,
        message: format!(
            "{} of {} period values overlap existing data through '{}'; new data starts at '{}'",
            overlapping_rows,
            periods.len(),
            last.raw(),
            append_from.as_deref().unwrap_or("?")
        ),
        existing_last_value: Some(last.raw().to_string()),
        new_first_value: new_first.clone(),
        new_last_value: new_last,
        overlapping_rows,
        overlap_start: new_first,
        overlap_end: Some(last.raw().to_string()),
        append_from,
        unparsed_values: parsed.unparsed.clone(),
    }
}
