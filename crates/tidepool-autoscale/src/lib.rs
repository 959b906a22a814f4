//! tidepool-autoscale — demand-driven provisioning for a compute cluster
//! and the proxy app in front of it.
//!
//! Each poll cycle builds a `StatusSnapshot` from four status sources,
//! asks the decision engine for at most one action, and dispatches it.
//! Teardown actions are gated by per-resource idle timers so a brief lull
//! in work does not tear capacity down.
//!
//! # Cycle
//!
//! ```text
//! if any relevant source failed:
//!     alert, skip
//!
//! queue > 0 and no cluster             → CreateCluster
//! queue > 0 and app stopped            → StartApp
//! queue = 0, no cluster, app running   → StopApp
//! idle, app running    (≥ threshold)   → StopApp
//! idle, app stopped    (≥ threshold)   → DeleteCluster
//! ```
//!
//! Failed actions are alerted and never retried inside the cycle; the
//! next cycle sees the same status and derives the same action again.

pub mod dispatcher;
pub mod driver;
pub mod engine;
pub mod snapshot;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dispatcher::{ActionDispatcher, DispatchOutcome};
pub use driver::{CycleReport, PollDriver};
pub use engine::{Decision, IdleTimerState, decide, settle};
pub use snapshot::SnapshotBuilder;
