//! Action dispatcher — runs the chosen action against its actuator.
//!
//! Exactly one actuator call per dispatch. Failures go to the alert sink
//! and are reported back as an outcome; nothing is retried here, the next
//! cycle re-derives the action from fresh status.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use tidepool_core::{Alert, AlertSink, ClusterManager, ControlError, ProxyApp, ResourceAction};

/// How a dispatched action ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// `NoOp`; no actuator was called.
    Skipped,
    Completed,
    Failed(String),
}

impl DispatchOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, DispatchOutcome::Completed)
    }
}

/// Handles to the actuators and the alert channel.
#[derive(Clone)]
pub struct ActionDispatcher {
    cluster: Arc<dyn ClusterManager>,
    app: Arc<dyn ProxyApp>,
    alerts: Arc<dyn AlertSink>,
}

impl ActionDispatcher {
    pub fn new(
        cluster: Arc<dyn ClusterManager>,
        app: Arc<dyn ProxyApp>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            cluster,
            app,
            alerts,
        }
    }

    /// Run `action`. Never returns an error.
    pub async fn dispatch(&self, action: ResourceAction) -> DispatchOutcome {
        let result = match action {
            ResourceAction::NoOp => return DispatchOutcome::Skipped,
            ResourceAction::CreateCluster => self.cluster.create().await,
            ResourceAction::DeleteCluster => self.cluster.delete().await,
            ResourceAction::StartApp => self.app.start().await,
            ResourceAction::StopApp => self.app.stop().await,
        };

        match result {
            Ok(()) => {
                info!(%action, "action completed");
                DispatchOutcome::Completed
            }
            Err(e) => {
                let err = ControlError::Actuator {
                    action,
                    message: format!("{e:#}"),
                };
                warn!(%action, error = %err, "action failed");
                self.alerts.notify(Alert::new(err.to_string()));
                DispatchOutcome::Failed(format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCluster, FakeProxyApp, RecordingAlerts};
    use tidepool_core::ClusterStatus;

    struct Rig {
        cluster: Arc<FakeCluster>,
        app: Arc<FakeProxyApp>,
        alerts: Arc<RecordingAlerts>,
        dispatcher: ActionDispatcher,
    }

    fn rig(status: ClusterStatus, running: bool) -> Rig {
        let cluster = Arc::new(FakeCluster::new(status));
        let app = Arc::new(FakeProxyApp::new(running));
        let alerts = Arc::new(RecordingAlerts::new());
        let dispatcher = ActionDispatcher::new(cluster.clone(), app.clone(), alerts.clone());
        Rig {
            cluster,
            app,
            alerts,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn noop_calls_nothing() {
        let r = rig(ClusterStatus::Operational, true);
        let outcome = r.dispatcher.dispatch(ResourceAction::NoOp).await;
        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert_eq!(r.cluster.creates() + r.cluster.deletes(), 0);
        assert_eq!(r.app.starts() + r.app.stops(), 0);
    }

    #[tokio::test]
    async fn each_action_hits_one_actuator() {
        let r = rig(ClusterStatus::NotFound, false);

        assert!(r.dispatcher.dispatch(ResourceAction::CreateCluster).await.succeeded());
        assert_eq!(r.cluster.creates(), 1);

        assert!(r.dispatcher.dispatch(ResourceAction::StartApp).await.succeeded());
        assert_eq!(r.app.starts(), 1);

        assert!(r.dispatcher.dispatch(ResourceAction::StopApp).await.succeeded());
        assert_eq!(r.app.stops(), 1);

        assert!(r.dispatcher.dispatch(ResourceAction::DeleteCluster).await.succeeded());
        assert_eq!(r.cluster.deletes(), 1);

        assert_eq!(r.alerts.count(), 0);
    }

    #[tokio::test]
    async fn failure_is_alerted_not_retried() {
        let r = rig(ClusterStatus::Operational, false);
        r.cluster.fail_delete_with("409 conflict");

        let outcome = r.dispatcher.dispatch(ResourceAction::DeleteCluster).await;
        assert_eq!(outcome, DispatchOutcome::Failed("409 conflict".to_string()));
        assert_eq!(r.cluster.deletes(), 1);

        let alerts = r.alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].error(), "delete-cluster failed: 409 conflict");
    }
}
