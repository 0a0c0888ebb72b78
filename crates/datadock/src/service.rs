//! The public service surface. A UI or HTTP layer binds to
//! [`IngestService`]: submit files, poll job state, stream events, and
//! approve or reject staged loads. The commit that an approval triggers is
//! the only place durable table data is ever written.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::broadcast::{JobEvent, JobEventBroadcaster};
use crate::config::Config;
use crate::error::{ConfigError, DatadockError, JobError, Result};
use crate::job::{
    ApprovalOutcome, ApprovalReport, ApprovalRequest, DecisionPacket, IlPreview, IngestJob,
    JobCounts, JobRegistry, JobStatus, OtlPreview, RejectRequest,
};
use crate::period::{parse_period, parse_periods, PeriodValue};
use crate::pipeline::{incoming_headers, period_source_index, select_rows_to_append, PipelineConfig};
use crate::reader::read_table;
use crate::schema::canonicalize_column;
use crate::store::{dataset_repo, table_repo, Database, StoreError, TargetDataset};
use crate::vector::{InMemoryIndex, SchemaSignature, SimilarityIndex};
use crate::worker::{ApprovalSweeper, DirectoryScanner, WorkItem, WorkerContext, WorkerPool};

pub struct IngestService {
    config: Config,
    db: Database,
    index: Arc<dyn SimilarityIndex>,
    registry: Arc<JobRegistry>,
    events: JobEventBroadcaster,
    pool: WorkerPool,
    sweeper: Option<ApprovalSweeper>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    watch_shutdown: Arc<AtomicBool>,
    watch_handle: Mutex<Option<JoinHandle<()>>>,
}

impl IngestService {
    /// Builds the full service: database, job registry, similarity index
    /// (rebuilt from dataset metadata), worker pool and, when configured,
    /// the approval sweeper.
    pub fn from_config(config: Config) -> Result<Self> {
        let db = open_database(&config)?;

        let registry = Arc::new(JobRegistry::new(Some(db.clone())));
        let hydrated = registry.hydrate();
        if hydrated > 0 {
            info!("Restored {} persisted jobs", hydrated);
        }

        let index: Arc<dyn SimilarityIndex> = Arc::new(InMemoryIndex::new());
        let datasets = dataset_repo::list_all(&db)?;
        for dataset in &datasets {
            index.upsert(
                &dataset.id,
                &dataset.table_name,
                &SchemaSignature::new(
                    &dataset.table_name,
                    &dataset.columns,
                    dataset.period_column.as_deref(),
                ),
            )?;
        }
        if !datasets.is_empty() {
            info!("Rebuilt similarity index over {} datasets", datasets.len());
        }

        let events = JobEventBroadcaster::default();
        let pipeline_config = Arc::new(PipelineConfig::from_config(&config));
        let pool = WorkerPool::new(
            WorkerContext {
                config: pipeline_config,
                ai: config.ai.clone(),
                index: Arc::clone(&index),
                db: db.clone(),
                registry: Arc::clone(&registry),
                events: events.clone(),
            },
            config.worker_count,
        );

        let (sweeper, sweeper_handle) = if config.approval.timeout_minutes > 0 {
            let sweeper = ApprovalSweeper::new(
                Arc::clone(&registry),
                events.clone(),
                config.approval.timeout_minutes,
            );
            let handle = sweeper.start();
            (Some(sweeper), Some(handle))
        } else {
            (None, None)
        };

        Ok(Self {
            config,
            db,
            index,
            registry,
            events,
            pool,
            sweeper,
            sweeper_handle: Mutex::new(sweeper_handle),
            watch_shutdown: Arc::new(AtomicBool::new(false)),
            watch_handle: Mutex::new(None),
        })
    }

    /// Creates a job for `path` and queues it for analysis. Returns the
    /// job id, pollable immediately.
    pub fn submit(&self, path: &Path) -> Result<String> {
        let job = IngestJob::new(path);
        let id = job.id.clone();
        let item = WorkItem::from_job(&job);
        self.registry.insert(job.clone());
        self.events.publish(&job);

        if let Err(e) = self.pool.submit(item) {
            let _ = self.registry.update(&id, |job| {
                job.set_error(e.to_string());
                job.transition(JobStatus::Failed, Some("could not queue job".to_string()))
            });
            return Err(e.into());
        }
        info!("Queued {} as job {}", path.display(), id);
        Ok(id)
    }

    /// Scans the configured input directory and submits every tabular file
    /// found. Returns the created job ids.
    pub fn scan_input(&self) -> Result<Vec<String>> {
        let scanner = DirectoryScanner::new(&self.config.input_directory);
        let mut ids = Vec::new();
        for path in scanner.scan()? {
            ids.push(self.submit(&path)?);
        }
        Ok(ids)
    }

    /// Watches the input directory on a background thread, submitting
    /// tabular files as they appear. Stopped by [`shutdown`](Self::shutdown).
    pub fn watch_input(self: &Arc<Self>) {
        let service = Arc::clone(self);
        let scanner = DirectoryScanner::new(&self.config.input_directory);
        let shutdown = Arc::clone(&self.watch_shutdown);

        let handle = std::thread::spawn(move || {
            let submitter = Arc::clone(&service);
            let result = scanner.watch(
                move |path| {
                    if let Err(e) = submitter.submit(&path) {
                        warn!("could not submit {}: {e}", path.display());
                    }
                },
                shutdown,
            );
            if let Err(e) = result {
                error!("Input watch stopped: {e}");
            }
        });
        if let Ok(mut guard) = self.watch_handle.lock() {
            *guard = Some(handle);
        }
    }

    /// Full job snapshot, status and previews included. This is the
    /// polling call; jobs from earlier process lifetimes are read through
    /// from the database.
    pub fn job(&self, job_id: &str) -> Option<IngestJob> {
        self.registry.get_with_fallback(job_id)
    }

    /// All known jobs, newest first.
    pub fn jobs(&self) -> Vec<IngestJob> {
        self.registry.all()
    }

    pub fn counts(&self) -> JobCounts {
        self.registry.counts()
    }

    /// The decision packet alone, once analysis has produced one.
    pub fn preview(&self, job_id: &str) -> Option<DecisionPacket> {
        self.job(job_id).and_then(|job| job.decision)
    }

    /// All managed datasets, oldest first.
    pub fn datasets(&self) -> Result<Vec<TargetDataset>> {
        Ok(dataset_repo::list_all(&self.db)?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Approves a staged load and executes it. Idempotent: a terminal job
    /// is reported unchanged. A write failure moves the job to failed with
    /// the decision packet retained, and surfaces the error.
    pub fn approve(&self, job_id: &str, request: ApprovalRequest) -> Result<ApprovalReport> {
        let job = self
            .job(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(unchanged_report(&job));
        }
        if !job.is_decidable() {
            return Err(JobError::NotDecidable {
                id: job_id.to_string(),
                status: job.status.to_string(),
            }
            .into());
        }
        let decision = job
            .decision
            .clone()
            .ok_or_else(|| JobError::MissingDecision {
                id: job_id.to_string(),
            })?;

        let approver = request.decided_by.clone();
        let approved = self.registry.transition(
            job_id,
            JobStatus::Approved,
            Some(match &approver {
                Some(who) => format!("Approved by {who}"),
                None => "Approved".to_string(),
            }),
        )?;
        self.events.publish(&approved);

        match self.commit(&job, &decision, &request) {
            Ok(commit) => {
                let outcome = ApprovalOutcome {
                    approved: true,
                    decided_by: approver,
                    note: request.note,
                    decided_at: Utc::now(),
                    table_name: Some(commit.table_name.clone()),
                    rows_loaded: Some(commit.rows_loaded),
                };
                let done = self.registry.update(job_id, |job| {
                    job.approval = Some(outcome.clone());
                    job.transition(
                        commit.final_status,
                        Some(format!(
                            "Loaded {} rows into '{}'",
                            commit.rows_loaded, commit.table_name
                        )),
                    )
                })?;
                self.events.publish(&done);
                Ok(ApprovalReport {
                    job_id: job_id.to_string(),
                    changed: true,
                    status: done.status,
                    table_name: Some(commit.table_name),
                    rows_loaded: Some(commit.rows_loaded),
                })
            }
            Err(e) => {
                // decision packet stays on the record for retry/inspection
                let message = e.to_string();
                match self.registry.update(job_id, |job| {
                    job.set_error(&message);
                    job.transition(JobStatus::Failed, Some("Load failed".to_string()))
                }) {
                    Ok(failed) => self.events.publish(&failed),
                    Err(update_err) => {
                        error!("could not record failed load for job {job_id}: {update_err}")
                    }
                }
                Err(e)
            }
        }
    }

    /// Rejects a job. Accepted from any non-terminal state; idempotent on
    /// terminal jobs.
    pub fn reject(&self, job_id: &str, request: RejectRequest) -> Result<ApprovalReport> {
        let job = self
            .job(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        if job.status.is_terminal() {
            return Ok(unchanged_report(&job));
        }

        let rejected = self.registry.update(&job.id, |job| {
            job.approval = Some(ApprovalOutcome {
                approved: false,
                decided_by: request.decided_by.clone(),
                note: request.note.clone(),
                decided_at: Utc::now(),
                table_name: None,
                rows_loaded: None,
            });
            job.transition(
                JobStatus::Rejected,
                Some(match &request.decided_by {
                    Some(who) => format!("Rejected by {who}"),
                    None => "Rejected".to_string(),
                }),
            )
        })?;
        self.events.publish(&rejected);
        Ok(ApprovalReport {
            job_id: job_id.to_string(),
            changed: true,
            status: rejected.status,
            table_name: None,
            rows_loaded: None,
        })
    }

    /// Stops the watcher, the sweeper and the worker pool, joining their
    /// threads.
    pub fn shutdown(&self) {
        self.watch_shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.watch_handle.lock() {
            if let Some(handle) = guard.take() {
                if handle.join().is_err() {
                    error!("Input watch thread panicked");
                }
            }
        }
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
        if let Ok(mut guard) = self.sweeper_handle.lock() {
            if let Some(handle) = guard.take() {
                if handle.join().is_err() {
                    error!("Approval sweeper thread panicked");
                }
            }
        }
        self.pool.shutdown();
        self.pool.wait();
    }

    fn commit(
        &self,
        job: &IngestJob,
        decision: &DecisionPacket,
        request: &ApprovalRequest,
    ) -> Result<CommitOutcome> {
        match decision {
            DecisionPacket::OneTimeLoad(preview) => self.commit_one_time(job, preview, request),
            DecisionPacket::IncrementalLoad(preview) => self.commit_incremental(job, preview),
        }
    }

    /// Creates the new table, loads every data row, and registers the
    /// dataset with the metadata store and the similarity index.
    fn commit_one_time(
        &self,
        job: &IngestJob,
        preview: &OtlPreview,
        request: &ApprovalRequest,
    ) -> Result<CommitOutcome> {
        let table_name = match &request.table_name {
            Some(requested) => {
                let canonical = canonicalize_column(requested);
                table_repo::validate_table_name(&canonical)
                    .map_err(|_| StoreError::InvalidTableName(requested.clone()))?;
                canonical
            }
            None => preview.proposed_table_name.clone(),
        };

        let schema = job
            .inferred_schema
            .as_ref()
            .ok_or_else(|| JobError::MissingDecision { id: job.id.clone() })?;
        let table = read_table(&job.source_path)?;
        let data_start = usize::from(schema.has_header_row).min(table.records.len());
        let rows = &table.records[data_start..];

        table_repo::create_table(&self.db, &table_name, &preview.columns)?;
        let column_names: Vec<String> =
            preview.columns.iter().map(|c| c.name.clone()).collect();
        let rows_loaded = table_repo::insert_rows(&self.db, &table_name, &column_names, rows)?;

        let last_period_value = preview.period_column.as_deref().and_then(|period| {
            let idx = preview.columns.iter().position(|c| c.name == period)?;
            let values: Vec<String> = rows
                .iter()
                .map(|row| row.get(idx).cloned().unwrap_or_default())
                .collect();
            let parsed = parse_periods(&values);
            parsed.periods.last().map(|p| p.raw().to_string())
        });

        let now = Utc::now();
        let dataset = TargetDataset {
            id: Uuid::new_v4().to_string(),
            table_name: table_name.clone(),
            columns: preview.columns.clone(),
            period_column: preview.period_column.clone(),
            last_period_value,
            row_count: rows_loaded,
            created_at: now,
            updated_at: now,
        };
        dataset_repo::insert(&self.db, &dataset)?;
        self.index.upsert(
            &dataset.id,
            &dataset.table_name,
            &SchemaSignature::new(
                &dataset.table_name,
                &dataset.columns,
                dataset.period_column.as_deref(),
            ),
        )?;

        info!(
            "Created table '{}' with {} rows (job {})",
            table_name, rows_loaded, job.id
        );
        Ok(CommitOutcome {
            table_name,
            rows_loaded,
            final_status: JobStatus::Completed,
        })
    }

    /// Appends the strictly-new rows to the matched table, renamed and
    /// reordered through the validation mapping, extras dropped. Rows at
    /// or before the recorded last period are filtered out, so approving a
    /// full duplicate appends nothing and still completes.
    fn commit_incremental(&self, job: &IngestJob, preview: &IlPreview) -> Result<CommitOutcome> {
        let dataset = dataset_repo::find_by_id(&self.db, &preview.target.dataset_id)?
            .ok_or_else(|| StoreError::DatasetNotFound(preview.target.dataset_id.clone()))?;

        let schema = job
            .inferred_schema
            .as_ref()
            .ok_or_else(|| JobError::MissingDecision { id: job.id.clone() })?;
        let table = read_table(&job.source_path)?;
        let headers = incoming_headers(&table, schema);
        let data_start = usize::from(schema.has_header_row).min(table.records.len());
        let rows = &table.records[data_start..];

        let mapping = &preview.validation.column_mapping;
        let period_idx =
            period_source_index(&headers, mapping, dataset.period_column.as_deref());
        let existing_last = dataset
            .last_period_value
            .as_deref()
            .and_then(parse_period);
        let selected = select_rows_to_append(
            rows,
            period_idx,
            existing_last.as_ref(),
            preview.duplicate.as_ref(),
        );

        // source column index per mapping entry, in target order
        let source_indices: Vec<Option<usize>> = mapping
            .iter()
            .map(|m| headers.iter().position(|h| h == &m.source))
            .collect();
        let target_columns: Vec<String> = mapping.iter().map(|m| m.target.clone()).collect();
        let mapped_rows: Vec<Vec<String>> = selected
            .iter()
            .map(|&row_idx| {
                let row = &rows[row_idx];
                source_indices
                    .iter()
                    .map(|idx| {
                        idx.and_then(|i| row.get(i).cloned())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        let rows_loaded =
            table_repo::insert_rows(&self.db, &dataset.table_name, &target_columns, &mapped_rows)?;

        let new_last = last_period_after_append(
            existing_last,
            period_idx,
            &selected,
            rows,
        );
        dataset_repo::update_load_state(
            &self.db,
            &dataset.id,
            dataset.row_count + rows_loaded,
            new_last.as_deref().or(dataset.last_period_value.as_deref()),
        )?;

        info!(
            "Appended {} rows to '{}' (job {})",
            rows_loaded, dataset.table_name, job.id
        );
        Ok(CommitOutcome {
            table_name: dataset.table_name,
            rows_loaded,
            final_status: JobStatus::IncrementalLoadCompleted,
        })
    }
}

struct CommitOutcome {
    table_name: String,
    rows_loaded: u64,
    final_status: JobStatus,
}

fn unchanged_report(job: &IngestJob) -> ApprovalReport {
    ApprovalReport {
        job_id: job.id.clone(),
        changed: false,
        status: job.status,
        table_name: job.approval.as_ref().and_then(|a| a.table_name.clone()),
        rows_loaded: job.approval.as_ref().and_then(|a| a.rows_loaded),
    }
}

/// Latest period marker once the selected rows are appended. `None` when
/// nothing newer than the existing marker was loaded.
fn last_period_after_append(
    existing_last: Option<PeriodValue>,
    period_idx: Option<usize>,
    selected: &[usize],
    rows: &[Vec<String>],
) -> Option<String> {
    let idx = period_idx?;
    let mut last = existing_last;
    for &row_idx in selected {
        if let Some(period) = rows[row_idx].get(idx).and_then(|v| parse_period(v)) {
            if last.as_ref().is_none_or(|l| period > *l) {
                last = Some(period);
            }
        }
    }
    last.map(|p| p.raw().to_string())
}

fn open_database(config: &Config) -> Result<Database> {
    let db = match config.database.path.as_deref() {
        Some(":memory:") => Database::open_in_memory()?,
        Some(path) => Database::open(Path::new(path))?,
        None => {
            let path = crate::store::default_database_path().ok_or_else(|| {
                DatadockError::Config(ConfigError::Validation {
                    message: "no home directory found for the default database path".to_string(),
                })
            })?;
            Database::open(&path)?
        }
    };
    Ok(db)
}
