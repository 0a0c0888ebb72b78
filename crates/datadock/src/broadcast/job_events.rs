//! Job event broadcaster for real-time status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{DecisionPacket, IngestJob, JobStatus};

/// Snapshot event emitted on every job status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Original filename being processed.
    pub file_name: String,
    /// Status after the change.
    pub status: JobStatus,
    /// Human-readable message describing the change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Load route once analysis has decided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_type: Option<String>,
    /// Error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Builds an event from the job's current state.
    pub fn from_job(job: &IngestJob) -> Self {
        let load_type = job.decision.as_ref().map(|packet| {
            match packet {
                DecisionPacket::OneTimeLoad(_) => "one_time_load",
                DecisionPacket::IncrementalLoad(_) => "incremental_load",
            }
            .to_string()
        });
        Self {
            job_id: job.id.clone(),
            file_name: job.file_name.clone(),
            status: job.status,
            message: job.message.clone(),
            load_type,
            error: job.error.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts job events for streaming.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Snapshots `job` and sends it.
    pub fn publish(&self, job: &IngestJob) {
        self.send(JobEvent::from_job(job));
    }

    /// Creates a new subscriber for job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_broadcaster_send_receive() {
        let broadcaster = JobEventBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        let job = IngestJob::new(Path::new("/in/test.csv"));
        broadcaster.publish(&job);

        let received = rx.try_recv().unwrap();
        assert_eq!(received.job_id, job.id);
        assert_eq!(received.file_name, "test.csv");
        assert_eq!(received.status, JobStatus::Created);
        assert!(received.load_type.is_none());
    }

    #[test]
    fn test_send_without_receivers_is_ignored() {
        let broadcaster = JobEventBroadcaster::new(10);
        let job = IngestJob::new(Path::new("/in/test.csv"));
        broadcaster.publish(&job);
    }

    #[test]
    fn test_event_serializes_wire_status() {
        let mut job = IngestJob::new(Path::new("/in/test.csv"));
        job.transition(JobStatus::Preprocessing, Some("reading file".to_string()))
            .unwrap();
        let event = JobEvent::from_job(&job);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "preprocessing");
        assert_eq!(json["message"], "reading file");
        assert!(json.get("loadType").is_none());
        assert!(json.get("jobId").is_some());
    }

    #[test]
    fn test_default_capacity() {
        let broadcaster = JobEventBroadcaster::default();
        let _rx = broadcaster.subscribe();
    }
}
