//! Periodic sweep that fails jobs left undecided past the configured
//! approval timeout. Runs on its own thread; the registry does the actual
//! expiry so the per-job locking rules stay in one place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info};
use tokio::sync::Notify;

use crate::broadcast::JobEventBroadcaster;
use crate::job::JobRegistry;

pub struct ApprovalSweeper {
    registry: Arc<JobRegistry>,
    events: JobEventBroadcaster,
    timeout: chrono::Duration,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
}

impl ApprovalSweeper {
    pub fn new(
        registry: Arc<JobRegistry>,
        events: JobEventBroadcaster,
        timeout_minutes: u64,
    ) -> Self {
        Self::with_interval(registry, events, timeout_minutes, Duration::from_secs(60))
    }

    /// Sweep interval override, used by tests.
    pub fn with_interval(
        registry: Arc<JobRegistry>,
        events: JobEventBroadcaster,
        timeout_minutes: u64,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            events,
            timeout: chrono::Duration::minutes(timeout_minutes as i64),
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
        }
    }

    /// Starts the sweep loop in a background thread.
    pub fn start(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let events = self.events.clone();
        let timeout = self.timeout;
        let interval = self.interval;
        let shutdown = Arc::clone(&self.shutdown);
        let stop_signal = Arc::clone(&self.stop_signal);

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Approval sweeper could not start: {e}");
                    return;
                }
            };

            rt.block_on(async {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await; // skip immediate first tick

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        _ = stop_signal.notified() => {}
                    }
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    let expired = registry.expire_awaiting(timeout);
                    for id in &expired {
                        if let Some(job) = registry.get(id) {
                            events.publish(&job);
                        }
                    }
                    if !expired.is_empty() {
                        info!("Approval sweep expired {} stale jobs", expired.len());
                    }
                }
            });
        })
    }

    /// Signals the sweep loop to stop; takes effect without waiting for
    /// the next tick.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.stop_signal.notify_waiters();
    }
}
