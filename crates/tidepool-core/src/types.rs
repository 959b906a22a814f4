//! Domain types for one poll cycle.
//!
//! A `StatusSnapshot` is built fresh every cycle and thrown away once the
//! cycle's action (if any) has been dispatched. All types serialize to JSON
//! so they can be logged or shipped in alert payloads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

// ── Cluster status ─────────────────────────────────────────────────

/// Provisioning status of the compute cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum ClusterStatus {
    /// No cluster exists.
    NotFound,
    /// The cluster is up and accepts work.
    Operational,
    /// Provisioning, deleting, or otherwise between states.
    Transitioning(String),
    /// The provider reports an error state.
    Failed(String),
}

impl ClusterStatus {
    /// Map a raw provisioning state string onto a status.
    ///
    /// Matching is case-insensitive. Unknown states count as transitioning,
    /// never as operational.
    pub fn from_state(state: &str) -> Self {
        let state = state.trim();
        match state.to_ascii_lowercase().as_str() {
            "running" | "operational" => ClusterStatus::Operational,
            "notfound" | "not_found" => ClusterStatus::NotFound,
            "error" | "failed" | "unknown" => ClusterStatus::Failed(state.to_string()),
            _ => ClusterStatus::Transitioning(state.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterStatus::NotFound)
    }

    pub fn is_operational(&self) -> bool {
        matches!(self, ClusterStatus::Operational)
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterStatus::NotFound => write!(f, "not-found"),
            ClusterStatus::Operational => write!(f, "operational"),
            ClusterStatus::Transitioning(s) => write!(f, "transitioning({s})"),
            ClusterStatus::Failed(s) => write!(f, "failed({s})"),
        }
    }
}

// ── Sources ────────────────────────────────────────────────────────

/// One of the four status sources queried each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Queue,
    Cluster,
    App,
    JobEngine,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Queue => "queue",
            Source::Cluster => "cluster",
            Source::App => "app",
            Source::JobEngine => "job-engine",
        };
        f.write_str(name)
    }
}

// ── Snapshot ───────────────────────────────────────────────────────

/// Observed state of the managed resources for one poll cycle.
///
/// A field whose matching `*_error` is set holds a placeholder value and
/// must not be used for decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Units of pending work in the input queue.
    pub queue_length: u64,
    pub queue_error: Option<String>,
    pub cluster_status: ClusterStatus,
    pub cluster_error: Option<String>,
    /// Whether the proxy application is running.
    pub app_active: bool,
    pub app_error: Option<String>,
    /// Jobs currently executing on the cluster's job engine.
    pub active_job_count: u64,
    pub job_engine_error: Option<String>,
}

impl StatusSnapshot {
    /// A fully valid snapshot with no errors set.
    pub fn new(
        queue_length: u64,
        cluster_status: ClusterStatus,
        app_active: bool,
        active_job_count: u64,
    ) -> Self {
        Self {
            queue_length,
            queue_error: None,
            cluster_status,
            cluster_error: None,
            app_active,
            app_error: None,
            active_job_count,
            job_engine_error: None,
        }
    }

    /// Error recorded for a given source, if any.
    pub fn error_for(&self, source: Source) -> Option<&str> {
        match source {
            Source::Queue => self.queue_error.as_deref(),
            Source::Cluster => self.cluster_error.as_deref(),
            Source::App => self.app_error.as_deref(),
            Source::JobEngine => self.job_engine_error.as_deref(),
        }
    }

    /// Every `(source, error)` pair recorded in this snapshot.
    pub fn errors(&self) -> Vec<(Source, &str)> {
        [Source::Queue, Source::Cluster, Source::App, Source::JobEngine]
            .into_iter()
            .filter_map(|s| self.error_for(s).map(|e| (s, e)))
            .collect()
    }

    pub fn is_fully_valid(&self) -> bool {
        self.errors().is_empty()
    }
}

// ── Actions ────────────────────────────────────────────────────────

/// The single resource action chosen for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    NoOp,
    CreateCluster,
    DeleteCluster,
    StartApp,
    StopApp,
}

impl ResourceAction {
    pub fn is_noop(&self) -> bool {
        matches!(self, ResourceAction::NoOp)
    }
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceAction::NoOp => "no-op",
            ResourceAction::CreateCluster => "create-cluster",
            ResourceAction::DeleteCluster => "delete-cluster",
            ResourceAction::StartApp => "start-app",
            ResourceAction::StopApp => "stop-app",
        };
        f.write_str(name)
    }
}

/// A resource guarded by an idle timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleResource {
    App,
    Cluster,
}

impl IdleResource {
    /// The teardown action fired once the resource has been idle long enough.
    pub fn teardown(&self) -> ResourceAction {
        match self {
            IdleResource::App => ResourceAction::StopApp,
            IdleResource::Cluster => ResourceAction::DeleteCluster,
        }
    }
}

impl fmt::Display for IdleResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleResource::App => f.write_str("proxy-app"),
            IdleResource::Cluster => f.write_str("cluster"),
        }
    }
}

// ── Alerts ─────────────────────────────────────────────────────────

/// Body posted to the alert channel: `{"alert": {"error": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub alert: AlertBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertBody {
    pub error: String,
}

impl Alert {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            alert: AlertBody {
                error: error.into(),
            },
        }
    }

    pub fn error(&self) -> &str {
        &self.alert.error
    }
}
