//! Target discovery module
//!
//! Turns labelled containers into backup targets. The scheduling core
//! consumes the trait seams defined here; the Docker Engine client is the
//! production implementation of all of them.

mod docker;
mod labels;
mod models;
mod trait_def;

pub use docker::DockerClient;
pub use labels::target_from_labels;
pub use models::{BackupFormat, BackupTarget, LifecycleAction, LifecycleEvent};
pub use trait_def::{
    DiscoveryError, LifecycleEventSource, LifecycleEventStream, TargetSource, TriggerControl,
};
