//! Scheduled job records.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::cadence::Cadence;
use crate::discovery::BackupTarget;

/// One recurring backup timer bound to a target snapshot.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// Instance id, for logs and in-flight bookkeeping.
    pub id: Uuid,
    /// Identity of the target this job belongs to.
    pub owner: String,
    pub cadence: Cadence,
    /// Next instant this job is due.
    pub next_fire: DateTime<Utc>,
    /// Connection parameters captured at registration time. Never re-read
    /// while the job lives; a replaced container registers fresh jobs.
    pub target: BackupTarget,
}

impl ScheduledJob {
    /// Create a job whose first fire is the cadence's next occurrence
    /// after `now`. Registration never causes an immediate run.
    pub fn new(target: &BackupTarget, cadence: Cadence, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: target.name.clone(),
            cadence,
            next_fire: cadence.next_after(now),
            target: target.clone(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_fire <= now
    }
}

/// Build the full job set a target's metadata implies: one interval job if
/// an interval is declared, plus one fixed-time job per daily time.
///
/// Enablement is not checked here; callers decide whether the target should
/// be scheduled at all.
pub fn plan_for(target: &BackupTarget, now: DateTime<Utc>) -> Vec<ScheduledJob> {
    let mut jobs = Vec::new();
    if let Some(minutes) = target.interval_minutes {
        jobs.push(ScheduledJob::new(
            target,
            Cadence::interval_minutes(minutes),
            now,
        ));
    }
    for at in &target.daily_times {
        jobs.push(ScheduledJob::new(target, Cadence::Daily(*at), now));
    }
    jobs
}
