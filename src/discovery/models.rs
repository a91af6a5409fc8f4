//! Data models for target discovery.
//!
//! Defines backup targets, dump formats, and container lifecycle events.

use chrono::NaiveTime;

/// Dump format requested for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    Sql,
    Json,
    Both,
}

impl BackupFormat {
    /// Returns true if this format includes an SQL dump.
    pub fn includes_sql(&self) -> bool {
        matches!(self, BackupFormat::Sql | BackupFormat::Both)
    }

    /// Returns true if this format includes a JSON export.
    pub fn includes_json(&self) -> bool {
        matches!(self, BackupFormat::Json | BackupFormat::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackupFormat::Sql => "sql",
            BackupFormat::Json => "json",
            BackupFormat::Both => "both",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sql" => Some(BackupFormat::Sql),
            "json" => Some(BackupFormat::Json),
            "both" => Some(BackupFormat::Both),
            _ => None,
        }
    }
}

/// Container lifecycle actions that affect the scheduled job set.
///
/// Anything else coming off the event stream does not map and is dropped at
/// the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Create,
    Restart,
    Stop,
    Die,
    Destroy,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Create => "create",
            LifecycleAction::Restart => "restart",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Die => "die",
            LifecycleAction::Destroy => "destroy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "start" => Some(LifecycleAction::Start),
            "create" => Some(LifecycleAction::Create),
            "restart" => Some(LifecycleAction::Restart),
            "stop" => Some(LifecycleAction::Stop),
            "die" => Some(LifecycleAction::Die),
            "destroy" => Some(LifecycleAction::Destroy),
            _ => None,
        }
    }
}

/// A single container lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Container name, the identity jobs are keyed by.
    pub name: String,
    pub action: LifecycleAction,
}

impl LifecycleEvent {
    pub fn new(name: &str, action: LifecycleAction) -> Self {
        Self {
            name: name.to_string(),
            action,
        }
    }
}

/// A backup-eligible entity as observed at discovery time.
///
/// Everything the scheduler core needs (identity, enablement, cadences,
/// trigger flag) plus the connection parameters the executor consumes. The
/// core never interprets the connection fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupTarget {
    /// Unique, stable identity (container name).
    pub name: String,
    /// Whether this target should be scheduled at all.
    pub enabled: bool,
    /// Database host, as seen from the daemon.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database user.
    pub user: String,
    /// Database password (may be empty).
    pub password: String,
    /// Requested dump format.
    pub format: BackupFormat,
    /// Subdirectory under the output root that dumps land in.
    pub folder: String,
    /// Recurring cadence: fire every N minutes.
    pub interval_minutes: Option<u64>,
    /// Recurring cadence: fire daily at these local wall-clock times.
    pub daily_times: Vec<NaiveTime>,
    /// One-shot request to run a backup now, cleared after handling.
    pub trigger_requested: bool,
}

impl BackupTarget {
    /// Create a target with the same defaults an unlabelled container gets.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: false,
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            format: BackupFormat::Sql,
            folder: name.to_string(),
            interval_minutes: None,
            daily_times: Vec::new(),
            trigger_requested: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_interval_minutes(mut self, minutes: u64) -> Self {
        self.interval_minutes = Some(minutes);
        self
    }

    pub fn with_daily_time(mut self, time: NaiveTime) -> Self {
        self.daily_times.push(time);
        self
    }

    pub fn with_trigger(mut self) -> Self {
        self.trigger_requested = true;
        self
    }

    /// Returns true if the target declares at least one recurring cadence.
    pub fn has_schedule(&self) -> bool {
        self.interval_minutes.is_some() || !self.daily_times.is_empty()
    }
}
