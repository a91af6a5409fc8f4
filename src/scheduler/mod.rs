//! Scheduling core
//!
//! Owns the desired-state loop: the registry records which jobs exist, the
//! reconciler keeps it in sync with discovery, and the engine executes due
//! jobs on a fixed tick. All components share the registry behind one
//! `Arc<RwLock>` and are driven from separate tasks.

mod cadence;
mod engine;
mod job;
mod reconciler;
mod registry;

pub use cadence::Cadence;
pub use engine::SchedulerEngine;
pub use job::{plan_for, ScheduledJob};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use registry::JobRegistry;
