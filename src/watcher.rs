//! Background watcher for container lifecycle events.
//!
//! Holds a subscription to the runtime's event stream and reconciles the
//! job registry whenever a container comes or goes. Handles resubscription
//! when the stream drops, and runs a periodic fallback reconcile so a
//! missed event never desynchronizes the registry for long.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::discovery::LifecycleEventSource;
use crate::scheduler::Reconciler;

/// Background watcher that keeps the registry in sync with the runtime.
///
/// Runs in a loop:
/// 1. Subscribe to container lifecycle events
/// 2. Reconcile on every event, plus on a fixed fallback interval
/// 3. On stream loss: wait and subscribe again
pub struct EventWatcher {
    /// Source of lifecycle event subscriptions.
    events: Arc<dyn LifecycleEventSource>,
    /// Reconciler invoked on events and on the fallback timer.
    reconciler: Arc<Reconciler>,
    /// Fallback sweep interval while the stream is quiet.
    reconcile_interval: Duration,
    /// Delay between resubscription attempts.
    resubscribe_delay: Duration,
    /// Token to signal watcher shutdown.
    shutdown_token: CancellationToken,
}

impl EventWatcher {
    /// Create a new EventWatcher.
    pub fn new(
        events: Arc<dyn LifecycleEventSource>,
        reconciler: Arc<Reconciler>,
        reconcile_interval: Duration,
        resubscribe_delay: Duration,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            events,
            reconciler,
            reconcile_interval,
            resubscribe_delay,
            shutdown_token,
        }
    }

    /// Main watch loop - call from a spawned task.
    ///
    /// Maintains a persistent event subscription with automatic
    /// resubscription when the stream ends or fails.
    pub async fn run(&self) {
        info!(
            "Event watcher starting (fallback sweep every {:?})",
            self.reconcile_interval
        );

        loop {
            tokio::select! {
                result = self.watch_stream() => {
                    match result {
                        Ok(()) => warn!(
                            "Container event stream ended, resubscribing in {}s",
                            self.resubscribe_delay.as_secs()
                        ),
                        Err(e) => warn!(
                            "Container event stream lost: {:#}, resubscribing in {}s",
                            e,
                            self.resubscribe_delay.as_secs()
                        ),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Event watcher shutting down");
                    break;
                }
            }

            // Wait before resubscribing
            tokio::select! {
                _ = tokio::time::sleep(self.resubscribe_delay) => {}
                _ = self.shutdown_token.cancelled() => {
                    info!("Event watcher shutting down during resubscribe wait");
                    break;
                }
            }
        }

        info!("Event watcher stopped");
    }

    /// Consume one subscription until it ends or fails.
    ///
    /// Returns `Ok` when the stream ends cleanly and `Err` when subscribing
    /// or reading fails; the caller resubscribes either way.
    async fn watch_stream(&self) -> anyhow::Result<()> {
        let mut stream = self
            .events
            .subscribe()
            .await
            .context("subscribing to container events")?;
        info!("Watching container lifecycle events");

        // The first tick fires immediately, reconciling whatever changed
        // while no subscription was live.
        let mut fallback = tokio::time::interval(self.reconcile_interval);

        loop {
            tokio::select! {
                maybe_event = stream.next() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            debug!("Container {} {}", event.name, event.action.as_str());
                            self.run_reconcile().await;
                        }
                        Some(Err(e)) => return Err(e.context("reading container events")),
                        None => return Ok(()),
                    }
                }
                _ = fallback.tick() => {
                    debug!("Fallback reconcile sweep");
                    self.run_reconcile().await;
                }
            }
        }
    }

    /// Run one reconcile pass, downgrading failures to a warning so the
    /// subscription stays alive through discovery hiccups.
    async fn run_reconcile(&self) {
        if let Err(e) = self.reconciler.reconcile().await {
            warn!("Reconcile pass failed: {}", e);
        }
    }
}
