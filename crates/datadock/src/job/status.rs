use serde::{Deserialize, Serialize};

/// Lifecycle of an ingest job. Wire form is the snake_case string, which
/// is also what the database stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Preprocessing,
    SimilaritySearch,
    AwaitingApproval,
    SchemaMismatch,
    DuplicateDataDetected,
    Approved,
    Completed,
    IncrementalLoadCompleted,
    Rejected,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Preprocessing => "preprocessing",
            Self::SimilaritySearch => "similarity_search",
            Self::AwaitingApproval => "awaiting_approval",
            Self::SchemaMismatch => "schema_mismatch",
            Self::DuplicateDataDetected => "duplicate_data_detected",
            Self::Approved => "approved",
            Self::Completed => "completed",
            Self::IncrementalLoadCompleted => "incremental_load_completed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "preprocessing" => Some(Self::Preprocessing),
            "similarity_search" => Some(Self::SimilaritySearch),
            "awaiting_approval" => Some(Self::AwaitingApproval),
            "schema_mismatch" => Some(Self::SchemaMismatch),
            "duplicate_data_detected" => Some(Self::DuplicateDataDetected),
            "approved" => Some(Self::Approved),
            "completed" => Some(Self::Completed),
            "incremental_load_completed" => Some(Self::IncrementalLoadCompleted),
            "rejected" => Some(Self::Rejected),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::IncrementalLoadCompleted | Self::Rejected | Self::Failed
        )
    }

    /// States in which approve and reject are accepted. Schema mismatches
    /// and detected duplicates stay decidable so a human can override.
    pub fn is_awaiting_decision(&self) -> bool {
        matches!(
            self,
            Self::AwaitingApproval | Self::SchemaMismatch | Self::DuplicateDataDetected
        )
    }

    /// Whether the lifecycle permits moving to `to`. Rejection and failure
    /// are reachable from every non-terminal state; all other edges follow
    /// the pipeline order.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        if self.is_terminal() {
            return false;
        }
        if matches!(to, Rejected | Failed) {
            return true;
        }
        matches!(
            (self, to),
            (Created, Preprocessing)
                | (Preprocessing, SimilaritySearch)
                | (SimilaritySearch, AwaitingApproval)
                | (SimilaritySearch, SchemaMismatch)
                | (SimilaritySearch, DuplicateDataDetected)
                | (AwaitingApproval, Approved)
                | (SchemaMismatch, Approved)
                | (DuplicateDataDetected, Approved)
                | (Approved, Completed)
                | (Approved, IncrementalLoadCompleted)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
