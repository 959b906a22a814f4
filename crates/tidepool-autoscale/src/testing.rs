//! In-memory collaborators for tests.
//!
//! Each fake holds its observable state behind a mutex so a test can flip
//! it between cycles, inject failures, and inspect what was called.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use tidepool_core::{
    Alert, AlertSink, BoxFuture, ClusterManager, ClusterStatus, JobEngine, ProxyApp, WorkQueue,
};

fn take_failure(slot: &Mutex<Option<String>>) -> anyhow::Result<()> {
    match slot.lock().unwrap().clone() {
        Some(msg) => Err(anyhow::anyhow!(msg)),
        None => Ok(()),
    }
}

// ── Queue ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeQueue {
    length: Mutex<u64>,
    failure: Mutex<Option<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeQueue {
    pub fn new(length: u64) -> Self {
        Self {
            length: Mutex::new(length),
            ..Default::default()
        }
    }

    pub fn set(&self, length: u64) {
        *self.length.lock().unwrap() = length;
    }

    pub fn fail_with(&self, msg: &str) {
        *self.failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Block the next query until the returned handle is notified.
    pub fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(notify.clone());
        notify
    }
}

impl WorkQueue for FakeQueue {
    fn pending(&self) -> BoxFuture<'_, anyhow::Result<u64>> {
        Box::pin(async move {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            take_failure(&self.failure)?;
            Ok(*self.length.lock().unwrap())
        })
    }
}

// ── Cluster ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCluster {
    status: Mutex<Option<ClusterStatus>>,
    status_failure: Mutex<Option<String>>,
    create_failure: Mutex<Option<String>>,
    delete_failure: Mutex<Option<String>>,
    creates: Mutex<u32>,
    deletes: Mutex<u32>,
}

impl FakeCluster {
    pub fn new(status: ClusterStatus) -> Self {
        Self {
            status: Mutex::new(Some(status)),
            ..Default::default()
        }
    }

    pub fn set(&self, status: ClusterStatus) {
        *self.status.lock().unwrap() = Some(status);
    }

    pub fn fail_status_with(&self, msg: &str) {
        *self.status_failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_create_with(&self, msg: &str) {
        *self.create_failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_delete_with(&self, msg: &str) {
        *self.delete_failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn recover(&self) {
        *self.status_failure.lock().unwrap() = None;
        *self.create_failure.lock().unwrap() = None;
        *self.delete_failure.lock().unwrap() = None;
    }

    /// Create attempts, successful or not.
    pub fn creates(&self) -> u32 {
        *self.creates.lock().unwrap()
    }

    /// Delete attempts, successful or not.
    pub fn deletes(&self) -> u32 {
        *self.deletes.lock().unwrap()
    }
}

impl ClusterManager for FakeCluster {
    fn status(&self) -> BoxFuture<'_, anyhow::Result<ClusterStatus>> {
        Box::pin(async move {
            take_failure(&self.status_failure)?;
            Ok(self
                .status
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(ClusterStatus::NotFound))
        })
    }

    fn create(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            *self.creates.lock().unwrap() += 1;
            take_failure(&self.create_failure)?;
            self.set(ClusterStatus::Operational);
            Ok(())
        })
    }

    fn delete(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            *self.deletes.lock().unwrap() += 1;
            take_failure(&self.delete_failure)?;
            self.set(ClusterStatus::NotFound);
            Ok(())
        })
    }
}

// ── Proxy app ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProxyApp {
    running: Mutex<bool>,
    status_failure: Mutex<Option<String>>,
    start_failure: Mutex<Option<String>>,
    stop_failure: Mutex<Option<String>>,
    starts: Mutex<u32>,
    stops: Mutex<u32>,
}

impl FakeProxyApp {
    pub fn new(running: bool) -> Self {
        Self {
            running: Mutex::new(running),
            ..Default::default()
        }
    }

    pub fn set(&self, running: bool) {
        *self.running.lock().unwrap() = running;
    }

    pub fn fail_status_with(&self, msg: &str) {
        *self.status_failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_start_with(&self, msg: &str) {
        *self.start_failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_stop_with(&self, msg: &str) {
        *self.stop_failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn starts(&self) -> u32 {
        *self.starts.lock().unwrap()
    }

    pub fn stops(&self) -> u32 {
        *self.stops.lock().unwrap()
    }
}

impl ProxyApp for FakeProxyApp {
    fn is_running(&self) -> BoxFuture<'_, anyhow::Result<bool>> {
        Box::pin(async move {
            take_failure(&self.status_failure)?;
            Ok(*self.running.lock().unwrap())
        })
    }

    fn start(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            *self.starts.lock().unwrap() += 1;
            take_failure(&self.start_failure)?;
            self.set(true);
            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            *self.stops.lock().unwrap() += 1;
            take_failure(&self.stop_failure)?;
            self.set(false);
            Ok(())
        })
    }
}

// ── Job engine ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeJobs {
    active: Mutex<u64>,
    failure: Mutex<Option<String>>,
}

impl FakeJobs {
    pub fn new(active: u64) -> Self {
        Self {
            active: Mutex::new(active),
            ..Default::default()
        }
    }

    pub fn set(&self, active: u64) {
        *self.active.lock().unwrap() = active;
    }

    pub fn fail_with(&self, msg: &str) {
        *self.failure.lock().unwrap() = Some(msg.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

impl JobEngine for FakeJobs {
    fn active_jobs(&self) -> BoxFuture<'_, anyhow::Result<u64>> {
        Box::pin(async move {
            take_failure(&self.failure)?;
            Ok(*self.active.lock().unwrap())
        })
    }
}

// ── Alerts ─────────────────────────────────────────────────────────

/// Collects alerts in memory.
#[derive(Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl AlertSink for RecordingAlerts {
    fn notify(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}
