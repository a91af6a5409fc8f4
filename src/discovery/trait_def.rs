//! Trait seams between the scheduling core and the container runtime.
//!
//! The core only ever sees these traits; the Docker implementation lives in
//! [`super::docker`] and tests substitute in-memory fakes.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;

use super::models::{BackupTarget, LifecycleEvent};

/// Failure while fetching the current target list.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("container runtime request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("container runtime unavailable: {0}")]
    Unavailable(String),
}

/// A possibly endless stream of lifecycle notifications.
///
/// The stream ending (or yielding an error) means the subscription is dead;
/// consumers are expected to subscribe again.
pub type LifecycleEventStream =
    Pin<Box<dyn Stream<Item = anyhow::Result<LifecycleEvent>> + Send>>;

/// Source of the current set of backup-eligible targets.
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// Fetch all known containers as targets, whether labelled for backups
    /// or not. Enablement filtering happens downstream.
    async fn list_targets(&self) -> Result<Vec<BackupTarget>, DiscoveryError>;
}

/// Mutation channel for consuming one-shot trigger requests.
#[async_trait]
pub trait TriggerControl: Send + Sync {
    /// Reset the trigger flag on the named target after a triggered run.
    async fn clear_trigger(&self, name: &str) -> anyhow::Result<()>;
}

/// Subscription to container lifecycle notifications.
#[async_trait]
pub trait LifecycleEventSource: Send + Sync {
    /// Open a fresh event stream.
    async fn subscribe(&self) -> anyhow::Result<LifecycleEventStream>;
}
