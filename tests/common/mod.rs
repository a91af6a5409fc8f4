//! Common test infrastructure
//!
//! In-memory stand-ins for the Docker Engine and the dump executor, plus
//! target builders. Tests should only import from this module, not from
//! internal submodules.

// Each test binary compiles its own copy and uses a different subset.
#![allow(dead_code)]

mod executor;
mod fixtures;
mod host;

// Public API - this is what tests import
pub use executor::CountingExecutor;
pub use fixtures::{daily_target, interval_target, triggered_target};
pub use host::FakeDockerHost;
