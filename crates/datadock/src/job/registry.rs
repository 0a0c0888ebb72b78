//! In-memory job registry with an optional sqlite mirror. The map is the
//! authoritative copy; mirror failures are logged and never fail the
//! operation that triggered them.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{error, warn};

use super::record::{IngestJob, JobCounts};
use super::status::JobStatus;
use crate::error::JobError;
use crate::store::job_repo::{self, JobFilter, JobRow};
use crate::store::Database;

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, IngestJob>>,
    db: Option<Database>,
}

impl JobRegistry {
    pub fn new(db: Option<Database>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            db,
        }
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, IngestJob>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("job registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, IngestJob>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("job registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Loads every persisted job into the cache. Called once on startup;
    /// rows that no longer parse are skipped.
    pub fn hydrate(&self) -> usize {
        let Some(db) = &self.db else {
            return 0;
        };
        let rows = match job_repo::query(db, &JobFilter::default()) {
            Ok(rows) => rows,
            Err(e) => {
                error!("failed to load persisted jobs: {e}");
                return 0;
            }
        };
        let mut map = self.write_jobs();
        let mut loaded = 0;
        for row in &rows {
            if let Some(job) = from_row(row) {
                map.insert(job.id.clone(), job);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn insert(&self, job: IngestJob) {
        // mirrored under the write lock so snapshots reach sqlite in the
        // same order they were applied to the cache
        let mut map = self.write_jobs();
        self.persist(&job);
        map.insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &str) -> Option<IngestJob> {
        self.read_jobs().get(id).cloned()
    }

    /// Cache lookup with a read-through to the mirror, for jobs from an
    /// earlier process lifetime.
    pub fn get_with_fallback(&self, id: &str) -> Option<IngestJob> {
        if let Some(job) = self.get(id) {
            return Some(job);
        }
        let db = self.db.as_ref()?;
        let row = match job_repo::find_by_id(db, id) {
            Ok(row) => row?,
            Err(e) => {
                error!("failed to read job {id} from mirror: {e}");
                return None;
            }
        };
        let job = from_row(&row)?;
        self.write_jobs().insert(job.id.clone(), job.clone());
        Some(job)
    }

    /// All jobs, newest first.
    pub fn all(&self) -> Vec<IngestJob> {
        let mut jobs: Vec<IngestJob> = self.read_jobs().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        jobs
    }

    pub fn counts(&self) -> JobCounts {
        let map = self.read_jobs();
        JobCounts::tally(map.values().map(|job| &job.status))
    }

    /// Applies `f` to the job under the write lock and mirrors the result
    /// before the lock is released, so a concurrent update cannot land its
    /// snapshot in the mirror out of order. Returns the updated snapshot.
    pub fn update<F>(&self, id: &str, f: F) -> Result<IngestJob, JobError>
    where
        F: FnOnce(&mut IngestJob) -> Result<(), JobError>,
    {
        let mut map = self.write_jobs();
        let job = map.get_mut(id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        f(job)?;
        let snapshot = job.clone();
        self.persist(&snapshot);
        Ok(snapshot)
    }

    pub fn transition(
        &self,
        id: &str,
        to: JobStatus,
        message: Option<String>,
    ) -> Result<IngestJob, JobError> {
        self.update(id, |job| job.transition(to, message))
    }

    /// Fails decidable jobs whose last update is older than `timeout`.
    /// Returns the ids that were expired.
    pub fn expire_awaiting(&self, timeout: chrono::Duration) -> Vec<String> {
        let cutoff: DateTime<Utc> = Utc::now() - timeout;
        let mut expired = Vec::new();
        let mut map = self.write_jobs();
        let ids: Vec<String> = map
            .values()
            .filter(|job| job.is_decidable() && job.updated_at < cutoff)
            .map(|job| job.id.clone())
            .collect();
        for id in ids {
            if let Some(job) = map.get_mut(&id) {
                if job
                    .transition(
                        JobStatus::Failed,
                        Some("approval window expired".to_string()),
                    )
                    .is_ok()
                {
                    job.set_error("approval window expired");
                    self.persist(job);
                    expired.push(id.clone());
                }
            }
        }
        expired
    }

    fn persist(&self, job: &IngestJob) {
        let Some(db) = &self.db else {
            return;
        };
        let row = match to_row(job) {
            Ok(row) => row,
            Err(e) => {
                error!("failed to serialize job {}: {e}", job.id);
                return;
            }
        };
        if let Err(e) = job_repo::upsert(db, &row) {
            error!("failed to persist job {}: {e}", job.id);
        }
    }
}

fn to_row(job: &IngestJob) -> Result<JobRow, serde_json::Error> {
    Ok(JobRow {
        id: job.id.clone(),
        file_name: job.file_name.clone(),
        source_path: job.source_path.display().to_string(),
        status: job.status.as_str().to_string(),
        message: job.message.clone(),
        error: job.error.clone(),
        inferred_schema: job
            .inferred_schema
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
        candidates: if job.candidates.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&job.candidates)?)
        },
        decision: job.decision.as_ref().map(serde_json::to_string).transpose()?,
        approval: job.approval.as_ref().map(serde_json::to_string).transpose()?,
        history: Some(serde_json::to_string(&job.history)?),
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
        completed_at: job.completed_at.map(|t| t.to_rfc3339()),
    })
}

fn from_row(row: &JobRow) -> Option<IngestJob> {
    let Some(status) = JobStatus::parse(&row.status) else {
        warn!("skipping job {} with unknown status '{}'", row.id, row.status);
        return None;
    };
    let created_at = parse_timestamp(&row.id, &row.created_at)?;
    let updated_at = parse_timestamp(&row.id, &row.updated_at)?;
    let completed_at = match &row.completed_at {
        Some(raw) => Some(parse_timestamp(&row.id, raw)?),
        None => None,
    };

    Some(IngestJob {
        id: row.id.clone(),
        file_name: row.file_name.clone(),
        source_path: row.source_path.clone().into(),
        status,
        message: row.message.clone(),
        error: row.error.clone(),
        inferred_schema: parse_json_field(&row.id, "inferred_schema", &row.inferred_schema),
        candidates: parse_json_field(&row.id, "candidates", &row.candidates).unwrap_or_default(),
        decision: parse_json_field(&row.id, "decision", &row.decision),
        approval: parse_json_field(&row.id, "approval", &row.approval),
        history: parse_json_field(&row.id, "history", &row.history).unwrap_or_default(),
        created_at,
        updated_at,
        completed_at,
    })
}

fn parse_timestamp(id: &str, raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("skipping job {id} with unparsable timestamp '{raw}': {e}");
            None
        }
    }
}

fn parse_json_field<T: serde::de::DeserializeOwned>(
    id: &str,
    field: &str,
    raw: &Option<String>,
) -> Option<T> {
    let raw = raw.as_ref()?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("dropping unreadable {field} for job {id}: {e}");
            None
        }
    }
}
