//! Desired-state reconciliation between discovery and the job registry.
//!
//! Each pass fetches the current target list, registers jobs for enabled
//! targets that are not tracked yet, and retires jobs whose identity has
//! disappeared. Targets that stay tracked keep their existing jobs as-is;
//! on the container runtime a label change always surfaces as a
//! destroy/create pair, which this diff already handles.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::job::plan_for;
use super::registry::JobRegistry;
use crate::discovery::{DiscoveryError, TargetSource};
use crate::metrics;

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Identities newly tracked by this pass.
    pub registered: usize,
    /// Jobs created for the newly tracked identities.
    pub jobs_added: usize,
    /// Identities retired by this pass.
    pub retired: usize,
    /// Jobs cancelled for the retired identities.
    pub jobs_cancelled: usize,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.registered > 0 || self.retired > 0
    }
}

/// Keeps the job registry in sync with what discovery reports.
pub struct Reconciler {
    source: Arc<dyn TargetSource>,
    registry: Arc<RwLock<JobRegistry>>,
}

impl Reconciler {
    pub fn new(source: Arc<dyn TargetSource>, registry: Arc<RwLock<JobRegistry>>) -> Self {
        Self { source, registry }
    }

    /// Run one reconcile pass.
    ///
    /// Safe to call repeatedly: a pass over an unchanged target list is a
    /// no-op. A discovery failure aborts the pass before any registry
    /// mutation, so a flaky runtime never tears down healthy schedules.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, DiscoveryError> {
        let targets = match self.source.list_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                metrics::record_discovery_error();
                return Err(e);
            }
        };

        let now = Utc::now();
        let mut outcome = ReconcileOutcome::default();
        let mut registry = self.registry.write().await;

        for target in &targets {
            if !target.enabled || registry.is_tracked(&target.name) {
                continue;
            }
            let jobs = plan_for(target, now);
            if jobs.is_empty() {
                debug!(
                    "{} is enabled but declares no backup cadence, skipping",
                    target.name
                );
                continue;
            }
            for job in &jobs {
                info!(
                    "Scheduling backup {} for {}, first run at {}",
                    job.cadence, job.owner, job.next_fire
                );
            }
            let count = jobs.len();
            if registry.track(&target.name, jobs) {
                outcome.registered += 1;
                outcome.jobs_added += count;
            }
        }

        let current: HashSet<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        for identity in registry.tracked_identities() {
            if current.contains(identity.as_str()) {
                continue;
            }
            let cancelled = registry.cancel_all(&identity);
            if cancelled > 0 {
                info!(
                    "Retired {} scheduled job(s) for vanished target {}",
                    cancelled, identity
                );
                outcome.retired += 1;
                outcome.jobs_cancelled += cancelled;
            }
        }

        metrics::record_reconcile_pass();
        metrics::record_jobs_registered(outcome.jobs_added);
        metrics::record_jobs_cancelled(outcome.jobs_cancelled);
        metrics::set_schedule_gauges(registry.target_count(), registry.job_count());

        if outcome.changed() {
            info!(
                "Reconciled: +{} target(s) ({} jobs), -{} target(s) ({} jobs), tracking {}",
                outcome.registered,
                outcome.jobs_added,
                outcome.retired,
                outcome.jobs_cancelled,
                registry.target_count()
            );
        } else {
            debug!("Reconcile pass made no changes");
        }

        Ok(outcome)
    }
}
