//! Periodic pipeline runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::runner::{CollectionKind, Pipeline};

/// Runs the pipeline on a fixed interval until stopped.
pub struct PipelineScheduler {
    pipeline: Arc<Pipeline>,
    interval: Duration,
    kind: CollectionKind,
    limit: usize,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl PipelineScheduler {
    pub fn new(
        pipeline: Arc<Pipeline>,
        interval: Duration,
        kind: CollectionKind,
        limit: usize,
    ) -> Self {
        Self {
            pipeline,
            interval,
            kind,
            limit,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Spawns the loop. The first run starts immediately; a run that
    /// overruns the interval delays the next one instead of bunching up.
    pub fn start(&self) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let shutdown = Arc::clone(&self.shutdown);
        let wake = Arc::clone(&self.wake);
        let interval = self.interval;
        let kind = self.kind;
        let limit = self.limit;

        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {},
                    _ = wake.notified() => {},
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                match pipeline.run(kind, limit).await {
                    Ok(summary) => info!(
                        gold = summary.total_gold(),
                        grade = %summary.quality_grade,
                        "Scheduled run finished"
                    ),
                    Err(e) => error!(error = %e, "Scheduled run failed"),
                }
            }
            info!("Pipeline scheduler stopped");
        })
    }

    /// Signals the loop to exit after the current run.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Handle that stops the scheduler from another task or a signal
    /// handler.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: Arc::clone(&self.shutdown),
            wake: Arc::clone(&self.wake),
        }
    }
}

#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}
