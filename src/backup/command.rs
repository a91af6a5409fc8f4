//! Subprocess-based backup execution.
//!
//! Shells out to `mysqldump` (or whatever command is configured) with the
//! target's connection parameters and streams the dump straight to disk.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{BackupError, BackupExecutor};
use crate::config::BackupSettings;
use crate::discovery::BackupTarget;

/// Executor that runs one dump subprocess per backup.
pub struct CommandBackupExecutor {
    settings: BackupSettings,
}

impl CommandBackupExecutor {
    pub fn new(settings: BackupSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BackupExecutor for CommandBackupExecutor {
    async fn backup(&self, target: &BackupTarget) -> Result<(), BackupError> {
        if !target.format.includes_sql() {
            return Err(BackupError::Unsupported(target.format));
        }
        if target.format.includes_json() {
            warn!(
                "JSON export for {} is not implemented, writing SQL only",
                target.name
            );
        }

        let folder = self.settings.output_dir.join(&target.folder);
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(BackupError::Storage)?;

        let timestamp = Local::now().format("%Y-%m-%d__%H-%M-%S");
        let path = folder.join(format!("{}_{}.sql", target.name, timestamp));
        let dump_file = tokio::fs::File::create(&path)
            .await
            .map_err(BackupError::Storage)?;

        let mut command = Command::new(&self.settings.dump_command);
        command
            .arg("-h")
            .arg(&target.host)
            .arg("-P")
            .arg(target.port.to_string())
            .arg("-u")
            .arg(&target.user);
        // A bare "-p" would make mysqldump prompt and hang the run.
        if !target.password.is_empty() {
            command.arg(format!("-p{}", target.password));
        }
        command
            .arg("--all-databases")
            .arg("--routines")
            .arg("--events")
            .arg("--single-transaction")
            .arg("--quick")
            .arg("--lock-tables=false")
            .stdin(Stdio::null())
            .stdout(Stdio::from(dump_file.into_std().await))
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(BackupError::Spawn)?;
        let timeout = Duration::from_secs(self.settings.dump_timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(BackupError::Spawn(e)),
            Err(_) => {
                // kill_on_drop has reaped the dump process at this point.
                let _ = tokio::fs::remove_file(&path).await;
                return Err(BackupError::Timeout(self.settings.dump_timeout_secs));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Don't leave a truncated dump behind to be mistaken for a good one.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(BackupError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        if !output.stderr.is_empty() {
            debug!(
                "Dump for {} wrote to stderr: {}",
                target.name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        info!("Backup for {} written to {}", target.name, path.display());
        Ok(())
    }
}
