//! Polling loop for manually requested backups.
//!
//! Containers can ask for an immediate backup by setting the trigger label.
//! The poller scans for that flag, runs the backup right away outside the
//! regular schedule, then clears the label so the request fires once.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backup::BackupExecutor;
use crate::discovery::{TargetSource, TriggerControl};
use crate::metrics;

/// Background poller that serves one-shot backup requests.
///
/// Runs in a loop:
/// 1. List targets and pick the ones with the trigger flag set
/// 2. Run a backup for each, immediately
/// 3. Clear the flag, whether the backup succeeded or not
pub struct TriggerPoller {
    /// Source of container targets.
    source: Arc<dyn TargetSource>,
    /// Used to clear the trigger label after serving a request.
    control: Arc<dyn TriggerControl>,
    /// Executor that performs the actual dump.
    executor: Arc<dyn BackupExecutor>,
    /// Delay between scans.
    poll_interval: Duration,
    /// Token to signal poller shutdown.
    shutdown_token: CancellationToken,
}

impl TriggerPoller {
    /// Create a new TriggerPoller.
    pub fn new(
        source: Arc<dyn TargetSource>,
        control: Arc<dyn TriggerControl>,
        executor: Arc<dyn BackupExecutor>,
        poll_secs: u64,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            source,
            control,
            executor,
            poll_interval: Duration::from_secs(poll_secs),
            shutdown_token,
        }
    }

    /// Main polling loop - call from a spawned task.
    pub async fn run(&self) {
        info!(
            "Trigger poller starting (interval={}s)",
            self.poll_interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {
                    self.poll_once().await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Trigger poller shutting down");
                    break;
                }
            }
        }

        info!("Trigger poller stopped");
    }

    /// Scan once and serve every pending trigger request.
    ///
    /// Requests are served sequentially; a manual backup is rare enough that
    /// keeping dump processes from piling up matters more than latency.
    async fn poll_once(&self) {
        let targets = match self.source.list_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Trigger scan could not list containers: {}", e);
                metrics::record_discovery_error();
                return;
            }
        };

        for target in targets
            .into_iter()
            .filter(|t| t.enabled && t.trigger_requested)
        {
            info!("Backup trigger set on {}, running backup now", target.name);
            metrics::record_trigger_fire();

            let start_time = Instant::now();
            match self.executor.backup(&target).await {
                Ok(()) => {
                    let elapsed = start_time.elapsed();
                    info!(
                        "Triggered backup for {} completed in {:?}",
                        target.name, elapsed
                    );
                    metrics::record_backup_run("success", elapsed);
                }
                Err(e) => {
                    let elapsed = start_time.elapsed();
                    error!(
                        "Triggered backup for {} failed after {:?}: {}",
                        target.name, elapsed, e
                    );
                    metrics::record_backup_run("failed", elapsed);
                }
            }

            // Clear the flag even when the backup failed, otherwise a broken
            // target would be retried on every scan.
            match self.control.clear_trigger(&target.name).await {
                Ok(()) => debug!("Cleared trigger label on {}", target.name),
                Err(e) => warn!(
                    "Could not clear trigger on {}; it may fire again: {}",
                    target.name, e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::backup::BackupError;
    use crate::discovery::{BackupTarget, DiscoveryError};

    struct FakeSource {
        targets: Mutex<Vec<BackupTarget>>,
        fail: AtomicBool,
    }

    impl FakeSource {
        fn new(targets: Vec<BackupTarget>) -> Self {
            Self {
                targets: Mutex::new(targets),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl TargetSource for FakeSource {
        async fn list_targets(&self) -> Result<Vec<BackupTarget>, DiscoveryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DiscoveryError::Unavailable("socket closed".to_string()));
            }
            Ok(self.targets.lock().unwrap().clone())
        }
    }

    struct FakeControl {
        cleared: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl FakeControl {
        fn new() -> Self {
            Self {
                cleared: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn cleared(&self) -> Vec<String> {
            self.cleared.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TriggerControl for FakeControl {
        async fn clear_trigger(&self, name: &str) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("update rejected");
            }
            self.cleared.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    struct FakeExecutor {
        runs: Mutex<Vec<String>>,
        fail: AtomicBool,
    }

    impl FakeExecutor {
        fn new() -> Self {
            Self {
                runs: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn runs(&self) -> Vec<String> {
            self.runs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BackupExecutor for FakeExecutor {
        async fn backup(&self, target: &BackupTarget) -> Result<(), BackupError> {
            self.runs.lock().unwrap().push(target.name.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(BackupError::Failed {
                    status: "exit status: 2".to_string(),
                    stderr: "mock failure".to_string(),
                });
            }
            Ok(())
        }
    }

    fn poller(
        source: Arc<FakeSource>,
        control: Arc<FakeControl>,
        executor: Arc<FakeExecutor>,
    ) -> TriggerPoller {
        TriggerPoller::new(source, control, executor, 60, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_pending_trigger_runs_backup_and_clears_flag() {
        let source = Arc::new(FakeSource::new(vec![BackupTarget::new("orders-db")
            .with_enabled(true)
            .with_trigger()]));
        let control = Arc::new(FakeControl::new());
        let executor = Arc::new(FakeExecutor::new());

        poller(source, control.clone(), executor.clone())
            .poll_once()
            .await;

        assert_eq!(executor.runs(), vec!["orders-db".to_string()]);
        assert_eq!(control.cleared(), vec!["orders-db".to_string()]);
    }

    #[tokio::test]
    async fn test_trigger_on_disabled_target_is_ignored() {
        let source = Arc::new(FakeSource::new(vec![
            BackupTarget::new("retired-db").with_trigger()
        ]));
        let control = Arc::new(FakeControl::new());
        let executor = Arc::new(FakeExecutor::new());

        poller(source, control.clone(), executor.clone())
            .poll_once()
            .await;

        assert!(executor.runs().is_empty());
        assert!(control.cleared().is_empty());
    }

    #[tokio::test]
    async fn test_targets_without_trigger_are_left_alone() {
        let source = Arc::new(FakeSource::new(vec![
            BackupTarget::new("steady-db")
                .with_enabled(true)
                .with_interval_minutes(60),
            BackupTarget::new("eager-db").with_enabled(true).with_trigger(),
        ]));
        let control = Arc::new(FakeControl::new());
        let executor = Arc::new(FakeExecutor::new());

        poller(source, control.clone(), executor.clone())
            .poll_once()
            .await;

        assert_eq!(executor.runs(), vec!["eager-db".to_string()]);
        assert_eq!(control.cleared(), vec!["eager-db".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_backup_still_clears_the_flag() {
        let source = Arc::new(FakeSource::new(vec![BackupTarget::new("flaky-db")
            .with_enabled(true)
            .with_trigger()]));
        let control = Arc::new(FakeControl::new());
        let executor = Arc::new(FakeExecutor::new());
        executor.fail.store(true, Ordering::SeqCst);

        poller(source, control.clone(), executor.clone())
            .poll_once()
            .await;

        assert_eq!(executor.runs(), vec!["flaky-db".to_string()]);
        assert_eq!(control.cleared(), vec!["flaky-db".to_string()]);
    }

    #[tokio::test]
    async fn test_flag_left_set_when_clear_fails() {
        let source = Arc::new(FakeSource::new(vec![BackupTarget::new("sticky-db")
            .with_enabled(true)
            .with_trigger()]));
        let control = Arc::new(FakeControl::new());
        control.fail.store(true, Ordering::SeqCst);
        let executor = Arc::new(FakeExecutor::new());

        let poller = poller(source, control.clone(), executor.clone());
        poller.poll_once().await;
        // The flag is still visible on the next scan, so the backup runs
        // again. Serving twice beats silently dropping the request.
        poller.poll_once().await;

        assert_eq!(executor.runs().len(), 2);
        assert!(control.cleared().is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_skips_the_scan() {
        let source = Arc::new(FakeSource::new(vec![BackupTarget::new("orders-db")
            .with_enabled(true)
            .with_trigger()]));
        source.fail.store(true, Ordering::SeqCst);
        let control = Arc::new(FakeControl::new());
        let executor = Arc::new(FakeExecutor::new());

        poller(source, control.clone(), executor.clone())
            .poll_once()
            .await;

        assert!(executor.runs().is_empty());
        assert!(control.cleared().is_empty());
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let source = Arc::new(FakeSource::new(Vec::new()));
        let control = Arc::new(FakeControl::new());
        let executor = Arc::new(FakeExecutor::new());
        let token = CancellationToken::new();

        let poller = TriggerPoller::new(source, control, executor, 3600, token.clone());
        let task = tokio::spawn(async move { poller.run().await });

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("poller should stop promptly")
            .unwrap();
    }
}
