//! Execution engine for scheduled backup jobs.
//!
//! Ticks at a fixed rate, dispatches every due job onto its own task and
//! keeps per-job fire times moving. A job's fire time is advanced
//! provisionally when its run starts and recomputed from the completion
//! instant when the run ends, so a slow backup is never dispatched twice
//! concurrently; fires that would land during a run are skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::ScheduledJob;
use super::registry::JobRegistry;
use crate::backup::BackupExecutor;
use crate::metrics;

/// How long shutdown waits for each in-flight backup before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives due jobs from the registry through the backup executor.
pub struct SchedulerEngine {
    registry: Arc<RwLock<JobRegistry>>,
    executor: Arc<dyn BackupExecutor>,
    tick_interval: Duration,

    /// In-flight runs keyed by job id (not shared, managed by the engine loop).
    running: HashMap<Uuid, RunHandle>,

    shutdown_token: CancellationToken,
}

struct RunHandle {
    owner: String,
    handle: JoinHandle<()>,
}

impl SchedulerEngine {
    pub fn new(
        registry: Arc<RwLock<JobRegistry>>,
        executor: Arc<dyn BackupExecutor>,
        tick_interval: Duration,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            executor,
            tick_interval,
            running: HashMap::new(),
            shutdown_token,
        }
    }

    /// Main engine loop. Returns once shutdown has drained in-flight runs.
    pub async fn run(&mut self) {
        info!(
            "Starting scheduler engine with {:?} tick interval",
            self.tick_interval
        );

        loop {
            self.reap_finished_runs().await;

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {
                    self.dispatch_due_jobs().await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler engine received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Scheduler engine stopped");
    }

    /// Collect due jobs and start one run per job.
    async fn dispatch_due_jobs(&mut self) {
        let now = Utc::now();
        let due = {
            let mut registry = self.registry.write().await;
            let due: Vec<_> = registry
                .due_jobs(now)
                .into_iter()
                .filter(|job| !self.running.contains_key(&job.id))
                .collect();

            // Advance fire times before execution so the next tick cannot
            // dispatch the same job again while it is still running.
            for job in &due {
                registry.reschedule_from(&job.owner, job.id, now);
            }
            due
        };

        for job in due {
            self.spawn_run(job);
        }
    }

    /// Start the backup task for one due job.
    fn spawn_run(&mut self, job: ScheduledJob) {
        let id = job.id;
        let owner = job.owner.clone();
        info!("Starting backup for {} ({})", job.owner, job.cadence);
        metrics::set_backup_running(&owner, true);

        let executor = Arc::clone(&self.executor);
        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = executor.backup(&job.target).await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(()) => {
                    info!("Backup for {} completed in {:?}", job.owner, elapsed);
                    metrics::record_backup_run("success", elapsed);
                }
                Err(e) => {
                    error!("Backup for {} failed after {:?}: {}", job.owner, elapsed, e);
                    metrics::record_backup_run("failed", elapsed);
                }
            }
            metrics::set_backup_running(&job.owner, false);
        });

        self.running.insert(id, RunHandle { owner, handle });
    }

    /// Clean up handles for completed runs and restart their schedules from
    /// the completion instant.
    async fn reap_finished_runs(&mut self) {
        let finished: Vec<_> = self
            .running
            .iter()
            .filter(|(_, run)| run.handle.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for id in finished {
            if let Some(run) = self.running.remove(&id) {
                if let Err(e) = run.handle.await {
                    error!("Backup task for {} ended abnormally: {}", run.owner, e);
                    metrics::set_backup_running(&run.owner, false);
                }

                let now = Utc::now();
                let mut registry = self.registry.write().await;
                match registry.reschedule_from(&run.owner, id, now) {
                    Some(next) => debug!("Next backup for {} at {}", run.owner, next),
                    // The owner was retired while its backup ran; nothing
                    // left to reschedule.
                    None => debug!("Job for {} was retired while running", run.owner),
                }
            }
        }
    }

    /// Wait for in-flight backups to finish, bounded per task.
    async fn shutdown(&mut self) {
        if self.running.is_empty() {
            info!("Scheduler engine shutdown complete");
            return;
        }

        info!("Draining {} in-flight backup(s)...", self.running.len());
        for (_, run) in self.running.drain() {
            if tokio::time::timeout(DRAIN_TIMEOUT, run.handle).await.is_err() {
                warn!(
                    "Backup for {} did not finish within {:?}, abandoning it",
                    run.owner, DRAIN_TIMEOUT
                );
            }
        }
        info!("Scheduler engine shutdown complete");
    }
}
