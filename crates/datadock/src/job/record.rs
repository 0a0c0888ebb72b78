use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::preview::{ApprovalOutcome, DecisionPacket};
use super::status::JobStatus;
use crate::ai::InferredSchema;
use crate::error::JobError;
use crate::vector::CandidateMatch;

/// One entry of a job's status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: JobStatus,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Everything known about one submitted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJob {
    pub id: String,
    pub file_name: String,
    pub source_path: PathBuf,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inferred_schema: Option<InferredSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionPacket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalOutcome>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl IngestJob {
    pub fn new(source_path: &Path) -> Self {
        let now = Utc::now();
        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_path.display().to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            file_name,
            source_path: source_path.to_path_buf(),
            status: JobStatus::Created,
            message: None,
            error: None,
            inferred_schema: None,
            candidates: Vec::new(),
            decision: None,
            approval: None,
            history: vec![StatusChange {
                status: JobStatus::Created,
                at: now,
                message: None,
            }],
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Moves the job to `to`, recording the change in the history. Invalid
    /// edges leave the job untouched.
    pub fn transition(&mut self, to: JobStatus, message: Option<String>) -> Result<(), JobError> {
        if !self.status.can_transition_to(to) {
            return Err(JobError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        if message.is_some() {
            self.message = message.clone();
        }
        self.history.push(StatusChange {
            status: to,
            at: now,
            message,
        });
        Ok(())
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }

    pub fn is_decidable(&self) -> bool {
        self.status.is_awaiting_decision()
    }
}

/// Job totals bucketed by lifecycle stage.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub total: u64,
    /// Jobs a worker still owns (created through approved).
    pub active: u64,
    pub awaiting_decision: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
}

impl JobCounts {
    pub fn tally<'a>(statuses: impl Iterator<Item = &'a JobStatus>) -> Self {
        let mut counts = JobCounts::default();
        for status in statuses {
            counts.total += 1;
            match status {
                JobStatus::Completed | JobStatus::IncrementalLoadCompleted => {
                    counts.completed += 1
                }
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Rejected => counts.rejected += 1,
                s if s.is_awaiting_decision() => counts.awaiting_decision += 1,
                _ => counts.active += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_starts_created_with_history() {
        let job = IngestJob::new(Path::new("/in/sales.csv"));
        assert_eq!(job.file_name, "sales.csv");
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.history.len(), 1);
        assert_eq!(job.history[0].status, JobStatus::Created);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_transition_appends_history_and_message() {
        let mut job = IngestJob::new(Path::new("/in/sales.csv"));
        job.transition(JobStatus::Preprocessing, None).unwrap();
        job.transition(
            JobStatus::SimilaritySearch,
            Some("searching 3 datasets".to_string()),
        )
        .unwrap();

        assert_eq!(job.status, JobStatus::SimilaritySearch);
        assert_eq!(job.history.len(), 3);
        assert_eq!(job.message.as_deref(), Some("searching 3 datasets"));
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_invalid_transition_leaves_job_untouched() {
        let mut job = IngestJob::new(Path::new("/in/sales.csv"));
        let err = job
            .transition(JobStatus::Completed, None)
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.history.len(), 1);
    }

    #[test]
    fn test_terminal_transition_sets_completed_at() {
        let mut job = IngestJob::new(Path::new("/in/sales.csv"));
        job.transition(JobStatus::Failed, Some("boom".to_string()))
            .unwrap();
        assert!(job.completed_at.is_some());
        assert_eq!(job.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_counts_tally() {
        let statuses = [
            JobStatus::Completed,
            JobStatus::IncrementalLoadCompleted,
            JobStatus::Failed,
            JobStatus::SchemaMismatch,
            JobStatus::Preprocessing,
        ];
        let counts = JobCounts::tally(statuses.iter());
        assert_eq!(counts.total, 5);
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.awaiting_decision, 1);
        assert_eq!(counts.active, 1);
        assert_eq!(counts.rejected, 0);
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = IngestJob::new(Path::new("/in/sales.csv"));
        let json = serde_json::to_value(&job).unwrap();
        assert!(json.get("fileName").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "created");
    }
}
