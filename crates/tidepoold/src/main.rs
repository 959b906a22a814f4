//! tidepoold — the tidepool daemon.
//!
//! Keeps a compute cluster and its proxy app sized to the pending-work
//! queue: brings them up when work arrives and tears them down after a
//! configurable idle period.
//!
//! # Usage
//!
//! ```text
//! tidepoold run --config /etc/tidepool/tidepool.toml
//! tidepoold once --from-env          # one cycle, for cron or a serverless timer
//! tidepoold check-config --config tidepool.toml
//! ```

mod startup;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tidepoold", about = "tidepool daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll on a fixed interval until interrupted.
    Run(ConfigArgs),
    /// Run a single control cycle and exit.
    Once(ConfigArgs),
    /// Validate configuration and print the effective settings.
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to tidepool.toml.
    #[arg(long, short, default_value = "/etc/tidepool/tidepool.toml")]
    config: PathBuf,

    /// Read TIDEPOOL_* environment variables instead of a file.
    #[arg(long)]
    from_env: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Once(args) => once(args).await,
        Command::CheckConfig(args) => check_config(args),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,tidepoold=debug,tidepool_autoscale=debug,tidepool_remote=debug")
    });

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(args: ConfigArgs) -> anyhow::Result<()> {
    info!("tidepool daemon starting");

    // ── Startup ────────────────────────────────────────────────

    let config = startup::load_config(&args.config, args.from_env)?;
    let interval = config.poll_interval()?;
    let driver = Arc::new(startup::build_driver(&config)?);

    // ── Trigger loop ───────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_driver = driver.clone();
    let poll_handle = tokio::spawn(async move {
        loop_driver.run(interval, shutdown_rx).await;
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = poll_handle.await;

    info!("tidepool daemon stopped");
    Ok(())
}

async fn once(args: ConfigArgs) -> anyhow::Result<()> {
    let config = startup::load_config(&args.config, args.from_env)?;
    let driver = startup::build_driver(&config)?;

    let report = driver.poll_now().await;
    println!("{}", serde_json::to_string(&report)?);

    // Give the fire-and-forget alert tasks a moment before the runtime
    // goes away.
    tokio::time::sleep(config.http_timeout()?.min(std::time::Duration::from_secs(2))).await;
    Ok(())
}

fn check_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = startup::load_config(&args.config, args.from_env)?;
    let thresholds = config.idle_thresholds()?;

    println!("app idle threshold:     {}s", thresholds.app.as_secs());
    println!("cluster idle threshold: {}s", thresholds.cluster.as_secs());
    println!("poll interval:          {}s", config.poll_interval()?.as_secs());
    println!("http timeout:           {}ms", config.http_timeout()?.as_millis());
    println!("configuration OK");
    Ok(())
}
