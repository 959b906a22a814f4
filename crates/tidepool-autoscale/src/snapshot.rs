//! Status snapshot builder.
//!
//! Queries the four status sources concurrently and folds the results
//! into one `StatusSnapshot`. A failing source never aborts the others;
//! its error is captured in the snapshot instead.

use std::sync::Arc;

use tracing::{debug, warn};

use tidepool_core::{
    ClusterManager, ClusterStatus, JobEngine, ProxyApp, Source, StatusSnapshot, WorkQueue,
};

/// Handles to every status source.
#[derive(Clone)]
pub struct SnapshotBuilder {
    queue: Arc<dyn WorkQueue>,
    cluster: Arc<dyn ClusterManager>,
    app: Arc<dyn ProxyApp>,
    jobs: Arc<dyn JobEngine>,
}

impl SnapshotBuilder {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        cluster: Arc<dyn ClusterManager>,
        app: Arc<dyn ProxyApp>,
        jobs: Arc<dyn JobEngine>,
    ) -> Self {
        Self {
            queue,
            cluster,
            app,
            jobs,
        }
    }

    /// Build this cycle's snapshot. Never fails.
    pub async fn collect(&self) -> StatusSnapshot {
        let (queue, cluster, app, jobs) = tokio::join!(
            self.queue.pending(),
            self.cluster.status(),
            self.app.is_running(),
            self.jobs.active_jobs(),
        );

        let (queue_length, queue_error) = split(Source::Queue, queue, 0);
        let (cluster_status, cluster_error) = split(
            Source::Cluster,
            cluster,
            ClusterStatus::Failed("unavailable".to_string()),
        );
        let (app_active, app_error) = split(Source::App, app, false);
        let (active_job_count, job_engine_error) = split(Source::JobEngine, jobs, 0);

        let snapshot = StatusSnapshot {
            queue_length,
            queue_error,
            cluster_status,
            cluster_error,
            app_active,
            app_error,
            active_job_count,
            job_engine_error,
        };

        debug!(
            queue = snapshot.queue_length,
            cluster = %snapshot.cluster_status,
            app_active = snapshot.app_active,
            jobs = snapshot.active_job_count,
            errors = snapshot.errors().len(),
            "status snapshot collected"
        );

        snapshot
    }
}

fn split<T>(source: Source, result: anyhow::Result<T>, placeholder: T) -> (T, Option<String>) {
    match result {
        Ok(value) => (value, None),
        Err(e) => {
            warn!(%source, error = %e, "status query failed");
            (placeholder, Some(format!("{e:#}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCluster, FakeJobs, FakeProxyApp, FakeQueue};

    fn builder(
        queue: FakeQueue,
        cluster: FakeCluster,
        app: FakeProxyApp,
        jobs: FakeJobs,
    ) -> SnapshotBuilder {
        SnapshotBuilder::new(
            Arc::new(queue),
            Arc::new(cluster),
            Arc::new(app),
            Arc::new(jobs),
        )
    }

    #[tokio::test]
    async fn all_sources_succeed() {
        let b = builder(
            FakeQueue::new(7),
            FakeCluster::new(ClusterStatus::Operational),
            FakeProxyApp::new(true),
            FakeJobs::new(2),
        );
        let snap = b.collect().await;
        assert_eq!(snap, StatusSnapshot::new(7, ClusterStatus::Operational, true, 2));
        assert!(snap.is_fully_valid());
    }

    #[tokio::test]
    async fn one_failure_does_not_hide_the_others() {
        let queue = FakeQueue::new(0);
        queue.fail_with("queue service unavailable");
        let b = builder(
            queue,
            FakeCluster::new(ClusterStatus::NotFound),
            FakeProxyApp::new(true),
            FakeJobs::new(4),
        );

        let snap = b.collect().await;
        assert_eq!(
            snap.queue_error.as_deref(),
            Some("queue service unavailable")
        );
        assert_eq!(snap.cluster_status, ClusterStatus::NotFound);
        assert!(snap.app_active);
        assert_eq!(snap.active_job_count, 4);
        assert_eq!(snap.errors().len(), 1);
    }

    #[tokio::test]
    async fn every_source_failing_still_yields_a_snapshot() {
        let queue = FakeQueue::new(1);
        queue.fail_with("q");
        let cluster = FakeCluster::new(ClusterStatus::Operational);
        cluster.fail_status_with("c");
        let app = FakeProxyApp::new(true);
        app.fail_status_with("a");
        let jobs = FakeJobs::new(1);
        jobs.fail_with("j");

        let snap = builder(queue, cluster, app, jobs).collect().await;
        assert_eq!(snap.errors().len(), 4);
        assert!(!snap.cluster_status.is_operational());
    }
}
