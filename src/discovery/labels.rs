//! Label parsing for discovered containers.
//!
//! A container opts into backups through labels under a configurable prefix
//! (default `mybackup`): `enable`, `host`, `port`, `user`, `password`,
//! `backup_format`, `backup_folder`, `backup_interval_hours`, `backup_times`
//! and `trigger_backup`. Missing labels fall back to defaults; malformed
//! values are logged and skipped so one bad label never hides a container.

use std::collections::HashMap;

use chrono::NaiveTime;
use tracing::warn;

use crate::discovery::models::{BackupFormat, BackupTarget};

/// Upper bound on the interval cadence, one leap year in minutes. Longer
/// values are treated as typos.
const MAX_INTERVAL_MINUTES: u64 = 366 * 24 * 60;

/// Build a [`BackupTarget`] from a container's name and label map.
pub fn target_from_labels(
    name: &str,
    prefix: &str,
    labels: &HashMap<String, String>,
) -> BackupTarget {
    let mut target = BackupTarget::new(name);

    target.enabled = flag_set(label(labels, prefix, "enable"));
    target.trigger_requested = flag_set(label(labels, prefix, "trigger_backup"));

    if let Some(host) = label(labels, prefix, "host") {
        target.host = host.to_string();
    }
    if let Some(raw) = label(labels, prefix, "port") {
        match raw.trim().parse::<u16>() {
            Ok(port) => target.port = port,
            Err(_) => warn!("Ignoring unparseable port label '{}' on {}", raw, name),
        }
    }
    if let Some(user) = label(labels, prefix, "user") {
        target.user = user.to_string();
    }
    if let Some(password) = label(labels, prefix, "password") {
        target.password = password.to_string();
    }
    if let Some(raw) = label(labels, prefix, "backup_format") {
        match BackupFormat::from_str(raw) {
            Some(format) => target.format = format,
            None => warn!("Unknown backup format '{}' on {}, using sql", raw, name),
        }
    }
    if let Some(folder) = label(labels, prefix, "backup_folder") {
        target.folder = folder.to_string();
    }
    if let Some(raw) = label(labels, prefix, "backup_interval_hours") {
        target.interval_minutes = parse_interval_minutes(name, raw);
    }
    if let Some(raw) = label(labels, prefix, "backup_times") {
        target.daily_times = parse_daily_times(name, raw);
    }

    target
}

fn label<'a>(labels: &'a HashMap<String, String>, prefix: &str, key: &str) -> Option<&'a str> {
    labels.get(&format!("{}.{}", prefix, key)).map(String::as_str)
}

/// The boolean labels accept "true" in any casing; anything else is off.
fn flag_set(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("true"))
}

/// Convert a fractional-hours label into whole minutes.
///
/// Values that do not parse, or that round down to zero minutes, disable the
/// interval cadence for this target.
fn parse_interval_minutes(name: &str, raw: &str) -> Option<u64> {
    let minutes = match raw.trim().parse::<f64>() {
        Ok(hours) if hours > 0.0 => (hours * 60.0) as u64,
        Ok(_) => {
            warn!("Ignoring non-positive backup interval '{}' on {}", raw, name);
            return None;
        }
        Err(_) => {
            warn!("Ignoring unparseable backup interval '{}' on {}", raw, name);
            return None;
        }
    };
    if minutes == 0 {
        warn!("Backup interval '{}' on {} is below one minute, ignoring", raw, name);
        return None;
    }
    if minutes > MAX_INTERVAL_MINUTES {
        warn!("Backup interval '{}' on {} exceeds a year, ignoring", raw, name);
        return None;
    }
    Some(minutes)
}

/// Parse a comma-separated list of `HH:MM` wall-clock times.
///
/// Malformed entries are skipped with a warning and duplicates collapse, so
/// the result maps one-to-one onto fixed-time jobs.
fn parse_daily_times(name: &str, raw: &str) -> Vec<NaiveTime> {
    let mut times = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match NaiveTime::parse_from_str(entry, "%H:%M") {
            Ok(time) => {
                if !times.contains(&time) {
                    times.push(time);
                }
            }
            Err(_) => warn!("Skipping malformed backup time '{}' on {}", entry, name),
        }
    }
    times
}
