//! Backup execution module
//!
//! Defines the executor seam the scheduler fires through, and the
//! subprocess implementation that shells out to `mysqldump`.

mod command;

pub use command::CommandBackupExecutor;

use async_trait::async_trait;
use thiserror::Error;

use crate::discovery::{BackupFormat, BackupTarget};

/// Failure of a single backup run.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("failed to launch dump command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("dump command exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("dump command did not finish within {0} seconds")]
    Timeout(u64),

    #[error("could not store dump output: {0}")]
    Storage(#[source] std::io::Error),

    #[error("dump format '{}' is not supported", .0.as_str())]
    Unsupported(BackupFormat),
}

/// Something that can take one backup of one target.
#[async_trait]
pub trait BackupExecutor: Send + Sync {
    /// Run a single backup for `target`.
    ///
    /// Implementations must be safe to call concurrently for distinct
    /// targets; the scheduler never runs the same target's job twice at
    /// once, but interval, fixed-time and triggered runs can overlap
    /// across targets.
    async fn backup(&self, target: &BackupTarget) -> Result<(), BackupError>;
}
