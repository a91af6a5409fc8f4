//! Target builders shared across the integration tests.

use chrono::NaiveTime;

use backup_warden::discovery::BackupTarget;

/// Enabled target backing up every `minutes` minutes.
pub fn interval_target(name: &str, minutes: u64) -> BackupTarget {
    BackupTarget::new(name)
        .with_enabled(true)
        .with_interval_minutes(minutes)
}

/// Enabled target backing up at fixed wall-clock times.
pub fn daily_target(name: &str, times: &[(u32, u32)]) -> BackupTarget {
    let mut target = BackupTarget::new(name).with_enabled(true);
    for (hour, minute) in times {
        target = target.with_daily_time(NaiveTime::from_hms_opt(*hour, *minute, 0).unwrap());
    }
    target
}

/// Enabled target with the one-shot trigger flag already set.
pub fn triggered_target(name: &str) -> BackupTarget {
    BackupTarget::new(name).with_enabled(true).with_trigger()
}
