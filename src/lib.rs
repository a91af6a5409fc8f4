//! Backup Warden Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod backup;
pub mod config;
pub mod discovery;
pub mod metrics;
pub mod scheduler;
pub mod trigger;
pub mod watcher;

// Re-export commonly used types for convenience
pub use backup::{BackupError, BackupExecutor, CommandBackupExecutor};
pub use config::{AppConfig, BackupSettings, CliConfig, FileConfig, SchedulerSettings};
pub use discovery::{
    BackupTarget, DockerClient, LifecycleEventSource, TargetSource, TriggerControl,
};
pub use scheduler::{JobRegistry, Reconciler, SchedulerEngine};
pub use trigger::TriggerPoller;
pub use watcher::EventWatcher;
