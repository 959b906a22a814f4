//! tidepool-core — shared types for the tidepool control loop.
//!
//! Holds the per-cycle data model (`StatusSnapshot`, `ResourceAction`),
//! the configuration parser, the error taxonomy, and the traits through
//! which the control loop talks to the outside world.

pub mod clients;
pub mod config;
pub mod error;
pub mod types;

pub use clients::{AlertSink, BoxFuture, ClusterManager, JobEngine, ProxyApp, WorkQueue};
pub use config::{ControllerConfig, IdleThresholds, parse_duration};
pub use error::{ConfigError, ControlError, ControlResult};
pub use types::*;
