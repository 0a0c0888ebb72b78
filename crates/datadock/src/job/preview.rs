//! What a reviewer sees before deciding, and what gets recorded after.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::JobStatus;
use crate::period::DuplicateResult;
use crate::schema::{ColumnSchema, ValidationResult};
use crate::vector::CandidateMatch;

/// The routed load proposal attached to a job once analysis finishes.
/// Serialized with a `loadType` tag so consumers can switch on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "loadType", rename_all = "snake_case")]
pub enum DecisionPacket {
    OneTimeLoad(OtlPreview),
    IncrementalLoad(IlPreview),
}

impl DecisionPacket {
    pub fn is_incremental(&self) -> bool {
        matches!(self, Self::IncrementalLoad(_))
    }
}

/// Proposal to create a new table and load every row into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlPreview {
    pub proposed_table_name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_column: Option<String>,
    /// First data rows, capped by `preview.sample_rows`.
    pub sample_rows: Vec<Vec<String>>,
    pub total_rows: u64,
}

/// Proposal to append into an existing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IlPreview {
    pub target: CandidateMatch,
    pub validation: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<DuplicateResult>,
    /// Rows the target table holds today.
    pub current_rows_count: u64,
    /// Rows that an approval would actually append.
    pub rows_to_append: u64,
    pub total_rows_after: u64,
}

impl IlPreview {
    /// `total_rows_after` is derived here and nowhere else.
    pub fn new(
        target: CandidateMatch,
        validation: ValidationResult,
        duplicate: Option<DuplicateResult>,
        current_rows_count: u64,
        rows_to_append: u64,
    ) -> Self {
        Self {
            target,
            validation,
            duplicate,
            current_rows_count,
            rows_to_append,
            total_rows_after: current_rows_count + rows_to_append,
        }
    }
}

/// Caller input for an approval.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    /// Overrides the proposed table name for one-time loads.
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Caller input for a rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// The recorded decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub decided_at: DateTime<Utc>,
    /// Final table the data went into, for approvals that loaded rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_loaded: Option<u64>,
}

/// Result of an approve or reject call. `changed` is false when the job
/// was already terminal and the call did nothing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReport {
    pub job_id: String,
    pub changed: bool,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_loaded: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_decision_packet_tagging() {
        let packet = DecisionPacket::OneTimeLoad(OtlPreview {
            proposed_table_name: "sales".to_string(),
            columns: vec![ColumnSchema::new("year", ColumnType::Integer)],
            period_column: Some("year".to_string()),
            sample_rows: vec![vec!["2024".to_string()]],
            total_rows: 1,
        });

        let json = serde_json::to_string(&packet).unwrap();
        assert!(json.contains("\"loadType\":\"one_time_load\""));
        assert!(json.contains("\"proposedTableName\":\"sales\""));

        let back: DecisionPacket = serde_json::from_str(&json).unwrap();
        assert!(!back.is_incremental());
    }

    #[test]
    fn test_il_preview_totals() {
        let target = CandidateMatch {
            dataset_id: "d1".to_string(),
            table_name: "sales".to_string(),
            score: 0.93,
        };
        let validation = ValidationResult::default();
        let preview = IlPreview::new(target, validation, None, 100, 12);
        assert_eq!(preview.current_rows_count, 100);
        assert_eq!(preview.rows_to_append, 12);
        assert_eq!(preview.total_rows_after, 112);

        let packet = DecisionPacket::IncrementalLoad(preview);
        let json = serde_json::to_string(&packet).unwrap();
        assert!(json.contains("\"loadType\":\"incremental_load\""));
        assert!(json.contains("\"currentRowsCount\":100"));
        assert!(json.contains("\"totalRowsAfter\":112"));
        assert!(packet.is_incremental());
    }

    #[test]
    fn test_approval_request_accepts_partial_json() {
        let req: ApprovalRequest = serde_json::from_str("{}").unwrap();
        assert!(req.table_name.is_none());

        let req: ApprovalRequest =
            serde_json::from_str(r#"{"tableName": "renamed", "decidedBy": "ops"}"#).unwrap();
        assert_eq!(req.table_name.as_deref(), Some("renamed"));
        assert_eq!(req.decided_by.as_deref(), Some("ops"));
    }
}
