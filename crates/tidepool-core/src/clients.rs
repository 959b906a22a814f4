//! Collaborator traits.
//!
//! The control loop only sees the outside world through these traits.
//! Implementations are expected to arrive fully authenticated; methods
//! return boxed futures so the traits stay object-safe.

use std::future::Future;
use std::pin::Pin;

use crate::types::{Alert, ClusterStatus};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The queue of pending work.
pub trait WorkQueue: Send + Sync {
    /// Approximate number of pending messages.
    fn pending(&self) -> BoxFuture<'_, anyhow::Result<u64>>;
}

/// Provisioning API for the compute cluster.
pub trait ClusterManager: Send + Sync {
    fn status(&self) -> BoxFuture<'_, anyhow::Result<ClusterStatus>>;

    /// Create (or re-create) the cluster.
    fn create(&self) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Begin deleting the cluster.
    fn delete(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// The job engine running inside the cluster.
pub trait JobEngine: Send + Sync {
    fn active_jobs(&self) -> BoxFuture<'_, anyhow::Result<u64>>;
}

/// The proxy application fronting the cluster.
pub trait ProxyApp: Send + Sync {
    fn is_running(&self) -> BoxFuture<'_, anyhow::Result<bool>>;
    fn start(&self) -> BoxFuture<'_, anyhow::Result<()>>;
    fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// Best-effort alert channel.
///
/// `notify` must return without waiting for delivery. Delivery failures
/// are dropped.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: Alert);
}
