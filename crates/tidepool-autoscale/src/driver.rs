//! Poll driver — one control cycle per trigger.
//!
//! ```text
//! trigger ─▶ single-flight guard ─▶ SnapshotBuilder::collect()
//!                                      │
//!                         relevant errors? ──yes──▶ alert, stop
//!                                      │ no
//!                                      ▼
//!                               engine::decide()
//!                                      │
//!                         ActionDispatcher::dispatch()
//!                                      │
//!                               engine::settle()
//! ```
//!
//! The idle timers live behind the same lock as the guard, so a cycle's
//! decision and its timer update land together and two cycles never
//! dispatch against the same resources at once.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tidepool_core::{
    Alert, AlertSink, ControlError, IdleThresholds, ResourceAction, Source, Timestamp,
};

use crate::dispatcher::{ActionDispatcher, DispatchOutcome};
use crate::engine::{self, IdleTimerState};
use crate::snapshot::SnapshotBuilder;

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cycle", rename_all = "snake_case")]
pub enum CycleReport {
    /// Another cycle was still in flight.
    Skipped,
    /// A relevant status source failed; nothing was decided.
    Unusable { failing: Vec<Source> },
    /// The engine ran. `outcome` is `Skipped` for `NoOp`.
    Decided {
        rule: Option<u8>,
        action: ResourceAction,
        outcome: DispatchOutcome,
    },
}

impl CycleReport {
    pub fn action(&self) -> ResourceAction {
        match self {
            CycleReport::Decided { action, .. } => *action,
            _ => ResourceAction::NoOp,
        }
    }
}

/// Drives control cycles. Build once at startup and share behind an `Arc`.
pub struct PollDriver {
    snapshots: SnapshotBuilder,
    dispatcher: ActionDispatcher,
    alerts: Arc<dyn AlertSink>,
    thresholds: IdleThresholds,
    idle: Mutex<IdleTimerState>,
}

impl PollDriver {
    pub fn new(
        snapshots: SnapshotBuilder,
        dispatcher: ActionDispatcher,
        alerts: Arc<dyn AlertSink>,
        thresholds: IdleThresholds,
    ) -> Self {
        Self {
            snapshots,
            dispatcher,
            alerts,
            thresholds,
            idle: Mutex::new(IdleTimerState::default()),
        }
    }

    pub fn thresholds(&self) -> IdleThresholds {
        self.thresholds
    }

    /// Current idle timers, or `None` while a cycle holds them.
    pub fn idle_state(&self) -> Option<IdleTimerState> {
        self.idle.try_lock().ok().map(|guard| *guard)
    }

    /// Run one cycle stamped with the wall clock.
    pub async fn poll_now(&self) -> CycleReport {
        self.poll(epoch_secs()).await
    }

    /// Run one cycle at `now` (seconds since the epoch).
    pub async fn poll(&self, now: Timestamp) -> CycleReport {
        let Ok(mut idle) = self.idle.try_lock() else {
            warn!("previous poll cycle still running, skipping");
            return CycleReport::Skipped;
        };

        let snapshot = self.snapshots.collect().await;

        let decision = match engine::decide(&snapshot, &idle, now, &self.thresholds) {
            Ok(decision) => decision,
            Err(ControlError::UnusableSnapshot(failing)) => {
                for source in &failing {
                    let message = snapshot.error_for(*source).unwrap_or_default().to_string();
                    let err = ControlError::Collection {
                        origin: *source,
                        message,
                    };
                    warn!(error = %err, "skipping cycle");
                    self.alerts.notify(Alert::new(err.to_string()));
                }
                return CycleReport::Unusable { failing };
            }
            Err(e) => {
                warn!(error = %e, "skipping cycle");
                self.alerts.notify(Alert::new(e.to_string()));
                return CycleReport::Unusable { failing: Vec::new() };
            }
        };

        for (source, error) in snapshot.errors() {
            debug!(%source, %error, "ignoring error from source no rule depends on");
        }

        let outcome = self.dispatcher.dispatch(decision.action).await;
        *idle = engine::settle(&decision.idle, decision.action, outcome.succeeded());

        if !decision.action.is_noop() {
            info!(
                rule = decision.rule,
                action = %decision.action,
                ?outcome,
                "poll cycle acted"
            );
        } else {
            debug!(
                rule = decision.rule,
                app_idle_since = idle.app_idle_since,
                cluster_idle_since = idle.cluster_idle_since,
                "poll cycle idle"
            );
        }

        CycleReport::Decided {
            rule: decision.rule,
            action: decision.action,
            outcome,
        }
    }

    /// Run cycles on a fixed interval until shutdown is signalled.
    ///
    /// Cycles run inline, so a slow cycle delays the next tick instead of
    /// overlapping it.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "poll driver started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_now().await;
                }
                _ = shutdown.changed() => {
                    info!("poll driver shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCluster, FakeJobs, FakeProxyApp, FakeQueue, RecordingAlerts};
    use tidepool_core::ClusterStatus;

    const T0: Timestamp = 1_700_000_000;

    struct Rig {
        queue: Arc<FakeQueue>,
        cluster: Arc<FakeCluster>,
        app: Arc<FakeProxyApp>,
        jobs: Arc<FakeJobs>,
        alerts: Arc<RecordingAlerts>,
        driver: Arc<PollDriver>,
    }

    fn rig(queue: u64, status: ClusterStatus, running: bool, jobs: u64) -> Rig {
        let queue = Arc::new(FakeQueue::new(queue));
        let cluster = Arc::new(FakeCluster::new(status));
        let app = Arc::new(FakeProxyApp::new(running));
        let jobs = Arc::new(FakeJobs::new(jobs));
        let alerts = Arc::new(RecordingAlerts::new());

        let snapshots =
            SnapshotBuilder::new(queue.clone(), cluster.clone(), app.clone(), jobs.clone());
        let dispatcher = ActionDispatcher::new(cluster.clone(), app.clone(), alerts.clone());
        let driver = Arc::new(PollDriver::new(
            snapshots,
            dispatcher,
            alerts.clone(),
            IdleThresholds::from_minutes(2),
        ));

        Rig {
            queue,
            cluster,
            app,
            jobs,
            alerts,
            driver,
        }
    }

    #[tokio::test]
    async fn collection_error_alerts_and_skips() {
        let r = rig(0, ClusterStatus::Operational, true, 0);
        r.driver.poll(T0).await;
        assert_eq!(
            r.driver.idle_state().unwrap().app_idle_since,
            Some(T0)
        );

        r.queue.fail_with("queue timeout");
        let report = r.driver.poll(T0 + 600).await;
        assert_eq!(
            report,
            CycleReport::Unusable {
                failing: vec![Source::Queue]
            }
        );
        assert_eq!(r.app.stops(), 0);
        assert_eq!(r.driver.idle_state().unwrap().app_idle_since, Some(T0));

        let alerts = r.alerts.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].error(), "queue status query failed: queue timeout");
    }

    #[tokio::test]
    async fn one_alert_per_failing_source() {
        let r = rig(0, ClusterStatus::Operational, true, 0);
        r.queue.fail_with("q down");
        r.app.fail_status_with("app api 500");

        let report = r.driver.poll(T0).await;
        assert_eq!(
            report,
            CycleReport::Unusable {
                failing: vec![Source::Queue, Source::App]
            }
        );
        assert_eq!(r.alerts.count(), 2);
    }

    #[tokio::test]
    async fn stale_job_engine_error_does_not_block_create() {
        let r = rig(3, ClusterStatus::NotFound, false, 0);
        r.jobs.fail_with("no such host");

        let report = r.driver.poll(T0).await;
        assert_eq!(report.action(), ResourceAction::CreateCluster);
        assert_eq!(r.cluster.creates(), 1);
        assert_eq!(r.alerts.count(), 0);
    }

    #[tokio::test]
    async fn overlapping_cycle_is_skipped() {
        let r = rig(0, ClusterStatus::Operational, true, 0);
        let release = r.queue.hold();

        let driver = r.driver.clone();
        let first = tokio::spawn(async move { driver.poll(T0).await });

        // Let the first cycle take the guard and park on the queue.
        while r.driver.idle_state().is_some() {
            tokio::task::yield_now().await;
        }

        assert_eq!(r.driver.poll(T0 + 1).await, CycleReport::Skipped);

        release.notify_one();
        let report = first.await.unwrap();
        assert!(matches!(report, CycleReport::Decided { rule: Some(4), .. }));
    }

    #[tokio::test]
    async fn failed_stop_is_alerted_and_rederived() {
        let r = rig(0, ClusterStatus::NotFound, true, 0);
        r.app.fail_stop_with("stop rejected");

        let report = r.driver.poll(T0).await;
        assert_eq!(
            report,
            CycleReport::Decided {
                rule: Some(3),
                action: ResourceAction::StopApp,
                outcome: DispatchOutcome::Failed("stop rejected".to_string()),
            }
        );
        assert_eq!(r.alerts.count(), 1);

        // Same status next cycle, same action.
        let report = r.driver.poll(T0 + 60).await;
        assert_eq!(report.action(), ResourceAction::StopApp);
        assert_eq!(r.app.stops(), 2);
    }
}
