//! Two-phase startup: load and validate configuration, then build the
//! clients and the poll driver. Runs once, before any trigger fires.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use tidepool_autoscale::{ActionDispatcher, PollDriver, SnapshotBuilder};
use tidepool_core::ControllerConfig;
use tidepool_remote::{GatewayClient, HttpAlertSink, HttpClient, LivyJobEngine};

/// Load configuration from a file or the environment and validate it.
pub fn load_config(path: &Path, from_env: bool) -> anyhow::Result<ControllerConfig> {
    let config = if from_env {
        ControllerConfig::from_env().context("loading configuration from environment")?
    } else {
        ControllerConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Wire the HTTP adapters into a ready-to-run driver.
pub fn build_driver(config: &ControllerConfig) -> anyhow::Result<PollDriver> {
    let thresholds = config.idle_thresholds()?;
    let client = HttpClient::new(config.http_timeout()?);

    let gateway_url = config
        .gateway
        .url
        .clone()
        .context("gateway.url is not set")?;
    let livy_url = config
        .job_engine
        .url
        .clone()
        .context("job_engine.url is not set")?;
    let alert_url = config.alert.url.clone().context("alert.url is not set")?;

    let gateway = Arc::new(GatewayClient::new(client.clone(), gateway_url));
    let livy = Arc::new(LivyJobEngine::new(client.clone(), livy_url));
    let alerts = Arc::new(HttpAlertSink::new(client, alert_url));

    let snapshots = SnapshotBuilder::new(gateway.clone(), gateway.clone(), gateway.clone(), livy);
    let dispatcher = ActionDispatcher::new(gateway.clone(), gateway, alerts.clone());

    info!(
        app_idle_secs = thresholds.app.as_secs(),
        cluster_idle_secs = thresholds.cluster.as_secs(),
        "poll driver initialized"
    );

    Ok(PollDriver::new(snapshots, dispatcher, alerts, thresholds))
}
