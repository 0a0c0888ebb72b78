use crate::job::JobStatus;

/// Events emitted by the pipeline while a job is being analyzed. Only
/// intermediate statuses flow through here; the final status and its
/// artifacts are applied by the worker from the returned `AnalysisResult`.
pub enum ProgressEvent {
    Status { status: JobStatus, message: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}
