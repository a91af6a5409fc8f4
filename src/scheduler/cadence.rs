//! Cadence arithmetic for recurring jobs.
//!
//! All next-fire computations are pure functions of an explicit `now`, so
//! schedules can be simulated across long windows in tests without waiting.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};

/// How a job recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Fire every fixed interval, measured from the end of the previous run.
    Interval(Duration),
    /// Fire once a day at a local wall-clock time.
    Daily(NaiveTime),
}

impl Cadence {
    pub fn interval_minutes(minutes: u64) -> Self {
        Cadence::Interval(Duration::from_secs(minutes * 60))
    }

    /// The next instant this cadence fires, strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Cadence::Interval(every) => {
                now + chrono::Duration::from_std(*every).unwrap_or_default()
            }
            Cadence::Daily(at) => next_daily_occurrence(now, *at),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Interval(every) => write!(f, "every {}m", every.as_secs() / 60),
            Cadence::Daily(at) => write!(f, "daily at {}", at.format("%H:%M")),
        }
    }
}

/// Find the next local wall-clock occurrence of `at` after `now`.
///
/// A DST gap can make `at` nonexistent on a given day; that day is skipped.
/// In the ambiguous fall-back hour the earlier mapping wins, so the job
/// still fires once.
fn next_daily_occurrence(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let mut date = now.with_timezone(&Local).date_naive();
    for _ in 0..3 {
        if let Some(candidate) = Local.from_local_datetime(&date.and_time(at)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    DateTime::<Utc>::MAX_UTC
}
