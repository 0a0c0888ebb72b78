//! Test harness: an isolated [`IngestService`] over a temporary input
//! directory, with helpers for submitting files and waiting for the
//! background workers to reach a decision.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_fs::TempDir;

use datadock::config::{Config, DatabaseConfig, MatchingConfig};
use datadock::job::ApprovalReport;
use datadock::{ApprovalRequest, IngestJob, IngestService, JobStatus, RejectRequest};

const DECISION_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    config: Config,
    pub service: Arc<IngestService>,
}

impl TestHarness {
    /// Default harness: one worker, in-memory database, default threshold.
    pub fn new() -> Self {
        Self::build(0.85, false)
    }

    /// Lowered similarity threshold, for flows that must match despite a
    /// differing schema.
    pub fn with_threshold(threshold: f32) -> Self {
        Self::build(threshold, false)
    }

    /// On-disk database, for restart scenarios.
    pub fn with_file_db() -> Self {
        Self::build(0.85, true)
    }

    fn build(threshold: f32, on_disk_db: bool) -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let input_dir = temp_dir.path().join("input");
        std::fs::create_dir_all(&input_dir).expect("input dir");

        let db_path = on_disk_db.then(|| {
            temp_dir
                .path()
                .join("datadock.db")
                .display()
                .to_string()
        });
        let config = Config {
            version: "1.0".to_string(),
            input_directory: input_dir.display().to_string(),
            worker_count: 1,
            matching: MatchingConfig {
                similarity_threshold: threshold,
                ..Default::default()
            },
            aliases: Vec::new(),
            preview: Default::default(),
            approval: Default::default(),
            ai: Default::default(),
            database: DatabaseConfig {
                path: Some(db_path.unwrap_or_else(|| ":memory:".to_string())),
            },
        };

        let service = Arc::new(IngestService::from_config(config.clone()).expect("service"));
        Self {
            temp_dir,
            input_dir,
            config,
            service,
        }
    }

    /// Stops the service and brings up a fresh one over the same database
    /// and input directory. Only meaningful with [`with_file_db`](Self::with_file_db).
    pub fn restart(&mut self) {
        self.service.shutdown();
        self.service =
            Arc::new(IngestService::from_config(self.config.clone()).expect("service restart"));
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    pub fn submit(&self, path: &Path) -> String {
        self.service.submit(path).expect("submit")
    }

    /// Submits and blocks until the job is decidable or terminal.
    pub fn submit_and_wait(&self, path: &Path) -> IngestJob {
        let id = self.submit(path);
        self.wait_for_decision(&id)
    }

    pub fn wait_for_decision(&self, job_id: &str) -> IngestJob {
        let deadline = Instant::now() + DECISION_TIMEOUT;
        loop {
            let job = self.service.job(job_id).expect("job exists");
            if job.is_decidable() || job.status.is_terminal() {
                return job;
            }
            assert!(
                Instant::now() < deadline,
                "job {job_id} stuck in status {}",
                job.status
            );
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn approve(&self, job_id: &str) -> ApprovalReport {
        self.service
            .approve(job_id, ApprovalRequest::default())
            .expect("approve")
    }

    pub fn approve_as(&self, job_id: &str, decided_by: &str) -> ApprovalReport {
        self.service
            .approve(
                job_id,
                ApprovalRequest {
                    decided_by: Some(decided_by.to_string()),
                    ..Default::default()
                },
            )
            .expect("approve")
    }

    pub fn reject(&self, job_id: &str) -> ApprovalReport {
        self.service
            .reject(job_id, RejectRequest::default())
            .expect("reject")
    }

    pub fn status_history(&self, job_id: &str) -> Vec<JobStatus> {
        self.service
            .job(job_id)
            .expect("job exists")
            .history
            .iter()
            .map(|change| change.status)
            .collect()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.service.shutdown();
    }
}
