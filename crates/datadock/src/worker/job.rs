use std::path::PathBuf;

use crate::ai::InferredSchema;
use crate::job::{DecisionPacket, IngestJob, JobStatus};
use crate::vector::CandidateMatch;

/// Unit of work queued for the analysis pool. The full job record stays in
/// the registry; workers only need the identity and the file.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub job_id: String,
    pub source_path: PathBuf,
    pub file_name: String,
}

impl WorkItem {
    pub fn from_job(job: &IngestJob) -> Self {
        Self {
            job_id: job.id.clone(),
            source_path: job.source_path.clone(),
            file_name: job.file_name.clone(),
        }
    }
}

/// What the analysis pipeline concluded about one file. The worker applies
/// this to the registry in a single update, so pollers never observe a
/// decidable status without its decision packet.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub job_id: String,
    pub status: JobStatus,
    pub schema: Option<InferredSchema>,
    pub candidates: Vec<CandidateMatch>,
    pub decision: Option<DecisionPacket>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl AnalysisResult {
    pub fn decided(
        item: &WorkItem,
        status: JobStatus,
        schema: InferredSchema,
        candidates: Vec<CandidateMatch>,
        decision: DecisionPacket,
        message: String,
    ) -> Self {
        Self {
            job_id: item.job_id.clone(),
            status,
            schema: Some(schema),
            candidates,
            decision: Some(decision),
            message: Some(message),
            error: None,
        }
    }

    pub fn failure(item: &WorkItem, error: impl Into<String>) -> Self {
        Self {
            job_id: item.job_id.clone(),
            status: JobStatus::Failed,
            schema: None,
            candidates: Vec::new(),
            decision: None,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == JobStatus::Failed
    }
}
