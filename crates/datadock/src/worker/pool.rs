//! Fixed-size thread pool running the analysis pipeline. Each worker owns
//! its own `Pipeline` (the inference backend is not shared) and applies
//! results to the job registry itself, so a poller never observes a
//! decidable status without its decision packet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::ai::build_backend;
use crate::broadcast::JobEventBroadcaster;
use crate::config::AiConfig;
use crate::error::WorkerError;
use crate::job::JobRegistry;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineContext, ProgressEvent, ProgressReporter};
use crate::store::Database;
use crate::vector::SimilarityIndex;
use crate::worker::job::{AnalysisResult, WorkItem};

/// Everything a worker thread needs to analyze jobs.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<PipelineConfig>,
    pub ai: AiConfig,
    pub index: Arc<dyn SimilarityIndex>,
    pub db: Database,
    pub registry: Arc<JobRegistry>,
    pub events: JobEventBroadcaster,
}

pub struct WorkerPool {
    work_sender: Sender<WorkItem>,
    result_receiver: Receiver<AnalysisResult>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns `worker_count` analysis threads.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0; config validation rejects that before
    /// a pool is ever built.
    pub fn new(ctx: WorkerContext, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (work_sender, work_receiver) = bounded::<WorkItem>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<AnalysisResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let work_rx = work_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_ctx = ctx.clone();
            workers.push(thread::spawn(move || {
                run_worker(worker_id, work_rx, result_tx, shutdown_flag, worker_ctx);
            }));
        }

        info!("Started {} analysis workers", worker_count);

        Self {
            work_sender,
            result_receiver,
            workers: Mutex::new(workers),
            shutdown,
        }
    }

    /// Enqueues a work item, blocking while the queue is full.
    pub fn submit(&self, item: WorkItem) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }
        self.work_sender
            .send(item)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Non-blocking variant of [`submit`](Self::submit).
    pub fn try_submit(&self, item: WorkItem) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }
        self.work_sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => WorkerError::QueueFull,
            TrySendError::Disconnected(_) => WorkerError::ChannelClosed,
        })
    }

    /// Blocks until a worker finishes an item. The registry already holds
    /// the applied result; this stream exists for callers that want to
    /// react without polling.
    pub fn recv_result(&self) -> Option<AnalysisResult> {
        self.result_receiver.recv().ok()
    }

    pub fn try_recv_result(&self) -> Option<AnalysisResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<AnalysisResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Joins every worker thread. Call after [`shutdown`](Self::shutdown).
    pub fn wait(&self) {
        let workers = {
            let mut guard = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };
        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Progress reporter that moves the job through the registry and publishes
/// each change to event subscribers.
struct RegistryProgress<'a> {
    job_id: &'a str,
    registry: &'a JobRegistry,
    events: &'a JobEventBroadcaster,
}

impl ProgressReporter for RegistryProgress<'_> {
    fn report(&self, event: ProgressEvent) {
        let ProgressEvent::Status { status, message } = event;
        match self.registry.transition(self.job_id, status, Some(message)) {
            Ok(job) => self.events.publish(&job),
            Err(e) => warn!("progress update for job {} dropped: {e}", self.job_id),
        }
    }
}

fn run_worker(
    worker_id: usize,
    work_receiver: Receiver<WorkItem>,
    result_sender: Sender<AnalysisResult>,
    shutdown: Arc<AtomicBool>,
    ctx: WorkerContext,
) {
    debug!("Worker {} started", worker_id);

    let inference = build_backend(&ctx.ai);
    let pipeline = Pipeline::new(
        Arc::clone(&ctx.config),
        inference,
        Arc::clone(&ctx.index),
        ctx.db.clone(),
    );

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match work_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(item) => {
                debug!("Worker {} analyzing {}", worker_id, item.file_name);
                let job_id = item.job_id.clone();
                let progress = RegistryProgress {
                    job_id: &job_id,
                    registry: &ctx.registry,
                    events: &ctx.events,
                };
                let (result, _ctx) = pipeline.run(PipelineContext::new(item), &progress);
                apply_result(&ctx.registry, &ctx.events, &result);

                // best effort: the registry is authoritative, an undrained
                // result stream must not stall the worker
                if let Err(TrySendError::Disconnected(_)) = result_sender.try_send(result) {
                    debug!("Worker {} result channel disconnected", worker_id);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} work channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

/// Applies a finished analysis to the registry in one update: artifacts
/// and final status land together.
fn apply_result(registry: &JobRegistry, events: &JobEventBroadcaster, result: &AnalysisResult) {
    let updated = registry.update(&result.job_id, |job| {
        if result.schema.is_some() {
            job.inferred_schema = result.schema.clone();
        }
        job.candidates = result.candidates.clone();
        job.decision = result.decision.clone();
        if let Some(error) = &result.error {
            job.set_error(error.clone());
        }
        job.transition(result.status, result.message.clone())
    });
    match updated {
        Ok(job) => events.publish(&job),
        Err(e) => error!("failed to record analysis of job {}: {e}", result.job_id),
    }
}
