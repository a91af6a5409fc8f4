//! Job registry: bookkeeping of live jobs keyed by target identity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::job::ScheduledJob;

/// In-memory record of every live scheduled job.
///
/// Shared as `Arc<RwLock<JobRegistry>>`: the reconciler mutates membership,
/// the engine reads due jobs and advances fire times. Nothing here survives
/// a restart; the first reconcile pass rebuilds the whole map.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<String, Vec<ScheduledJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
        }
    }

    /// Register a target's full job set in one step.
    ///
    /// Refuses to overwrite an identity that is already tracked and returns
    /// false in that case, leaving the existing jobs untouched.
    pub fn track(&mut self, identity: &str, jobs: Vec<ScheduledJob>) -> bool {
        if self.jobs.contains_key(identity) {
            return false;
        }
        self.jobs.insert(identity.to_string(), jobs);
        true
    }

    /// Drop every job for `identity`, returning how many were cancelled.
    /// Unknown identities are a no-op.
    pub fn cancel_all(&mut self, identity: &str) -> usize {
        self.jobs.remove(identity).map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_tracked(&self, identity: &str) -> bool {
        self.jobs.contains_key(identity)
    }

    pub fn tracked_identities(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    /// Number of tracked identities.
    pub fn target_count(&self) -> usize {
        self.jobs.len()
    }

    /// Number of live jobs across all identities.
    pub fn job_count(&self) -> usize {
        self.jobs.values().map(Vec::len).sum()
    }

    pub fn jobs_for(&self, identity: &str) -> &[ScheduledJob] {
        self.jobs.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Snapshot of every job due at `now`.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Vec<ScheduledJob> {
        self.jobs
            .values()
            .flatten()
            .filter(|job| job.is_due(now))
            .cloned()
            .collect()
    }

    /// Recompute a job's next fire time from `now`.
    ///
    /// Returns the new fire time, or None when the job no longer exists
    /// because its owner was retired in the meantime.
    pub fn reschedule_from(
        &mut self,
        owner: &str,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let job = self
            .jobs
            .get_mut(owner)?
            .iter_mut()
            .find(|job| job.id == id)?;
        job.next_fire = job.cadence.next_after(now);
        Some(job.next_fire)
    }
}
