//! Recording executor used in place of real dump processes.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use backup_warden::backup::{BackupError, BackupExecutor};
use backup_warden::discovery::BackupTarget;

/// Executor that records every run instead of spawning a process.
pub struct CountingExecutor {
    runs: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    delay: Duration,
}

impl CountingExecutor {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Each run sleeps for `delay` before completing.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            runs: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            delay,
        }
    }

    /// Make every run for `name` fail from now on.
    pub fn fail_runs_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Target names in run order.
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    pub fn runs_for(&self, name: &str) -> usize {
        self.runs.lock().unwrap().iter().filter(|r| *r == name).count()
    }
}

#[async_trait]
impl BackupExecutor for CountingExecutor {
    async fn backup(&self, target: &BackupTarget) -> Result<(), BackupError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.runs.lock().unwrap().push(target.name.clone());

        if self.failing.lock().unwrap().contains(&target.name) {
            return Err(BackupError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "simulated dump failure".to_string(),
            });
        }
        Ok(())
    }
}
