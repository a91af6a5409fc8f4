mod file_config;

pub use file_config::{BackupConfig, FileConfig, SchedulerConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub docker_url: String,
    pub docker_timeout_sec: u64,
    pub label_prefix: String,
    pub metrics_port: u16,
    pub output_dir: PathBuf,
    pub dump_command: String,
    pub dump_timeout_secs: u64,
    pub tick_interval_secs: u64,
    pub trigger_poll_secs: u64,
    pub reconcile_interval_secs: u64,
    pub resubscribe_delay_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            docker_url: "http://127.0.0.1:2375".to_string(),
            docker_timeout_sec: 30,
            label_prefix: "mybackup".to_string(),
            metrics_port: 9091,
            output_dir: PathBuf::from("./backups"),
            dump_command: "mysqldump".to_string(),
            dump_timeout_secs: 300,
            tick_interval_secs: 1,
            trigger_poll_secs: 10,
            reconcile_interval_secs: 300,
            resubscribe_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub docker_url: String,
    pub docker_timeout_sec: u64,
    pub label_prefix: String,
    pub metrics_port: u16,

    // Feature configs (with defaults)
    pub scheduler: SchedulerSettings,
    pub backup: BackupSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let docker_url = file
            .docker_url
            .unwrap_or_else(|| cli.docker_url.clone())
            .trim_end_matches('/')
            .to_string();
        let docker_timeout_sec = file.docker_timeout_sec.unwrap_or(cli.docker_timeout_sec);
        let label_prefix = file
            .label_prefix
            .unwrap_or_else(|| cli.label_prefix.clone());
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        // Scheduler settings - merge file config with CLI values
        let sched_file = file.scheduler.unwrap_or_default();
        let scheduler = SchedulerSettings {
            tick_interval_secs: sched_file
                .tick_interval_secs
                .unwrap_or(cli.tick_interval_secs),
            trigger_poll_secs: sched_file.trigger_poll_secs.unwrap_or(cli.trigger_poll_secs),
            reconcile_interval_secs: sched_file
                .reconcile_interval_secs
                .unwrap_or(cli.reconcile_interval_secs),
            resubscribe_delay_secs: sched_file
                .resubscribe_delay_secs
                .unwrap_or(cli.resubscribe_delay_secs),
        };

        let backup_file = file.backup.unwrap_or_default();
        let backup = BackupSettings {
            output_dir: backup_file
                .output_dir
                .map(PathBuf::from)
                .unwrap_or_else(|| cli.output_dir.clone()),
            dump_command: backup_file
                .dump_command
                .unwrap_or_else(|| cli.dump_command.clone()),
            dump_timeout_secs: backup_file.dump_timeout_secs.unwrap_or(cli.dump_timeout_secs),
        };

        if docker_url.is_empty() {
            bail!("docker_url must not be empty");
        }
        if label_prefix.is_empty() {
            bail!("label_prefix must not be empty");
        }
        // Lookups append the separating dot themselves.
        if label_prefix.ends_with('.') {
            bail!("label_prefix must not end with '.': {:?}", label_prefix);
        }
        if docker_timeout_sec == 0 {
            bail!("docker_timeout_sec must be at least 1");
        }
        if scheduler.tick_interval_secs == 0 {
            bail!("tick_interval_secs must be at least 1");
        }
        if scheduler.trigger_poll_secs == 0 {
            bail!("trigger_poll_secs must be at least 1");
        }
        if scheduler.reconcile_interval_secs == 0 {
            bail!("reconcile_interval_secs must be at least 1");
        }
        if backup.dump_command.is_empty() {
            bail!("dump_command must not be empty");
        }
        if backup.dump_timeout_secs == 0 {
            bail!("dump_timeout_secs must be at least 1");
        }

        Ok(Self {
            docker_url,
            docker_timeout_sec,
            label_prefix,
            metrics_port,
            scheduler,
            backup,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub tick_interval_secs: u64,
    pub trigger_poll_secs: u64,
    pub reconcile_interval_secs: u64,
    pub resubscribe_delay_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: 1,
            trigger_poll_secs: 10,
            reconcile_interval_secs: 300,
            resubscribe_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub output_dir: PathBuf,
    pub dump_command: String,
    pub dump_timeout_secs: u64,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./backups"),
            dump_command: "mysqldump".to_string(),
            dump_timeout_secs: 300,
        }
    }
}
