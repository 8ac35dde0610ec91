//! podgridd — the podgrid daemon.
//!
//! Single binary that assembles the orchestrator:
//! - Cluster state store (in memory)
//! - Simulated runtime driver
//! - Scheduler
//! - Health monitor
//! - REST API
//!
//! # Usage
//!
//! ```text
//! podgridd serve --config podgridd.toml --port 8080 --algorithm best-fit
//! podgridd config --config podgridd.toml
//! ```

mod agents;
mod config;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use podgrid_driver::SimDriver;
use podgrid_health::HealthMonitor;
use podgrid_placement::PlacementAlgorithm;
use podgrid_scheduler::Scheduler;
use podgrid_state::StateStore;

use crate::config::DaemonConfig;

const DEFAULT_FILTER: &str = "info,podgridd=debug,podgrid=debug";

#[derive(Parser)]
#[command(name = "podgridd", about = "podgrid orchestrator daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct Overrides {
    /// Path to a podgridd.toml file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the API server to.
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Placement algorithm (first-fit, best-fit, worst-fit).
    #[arg(long)]
    algorithm: Option<PlacementAlgorithm>,

    /// Seconds of heartbeat silence before a node is marked unhealthy.
    #[arg(long)]
    heartbeat_timeout: Option<u64>,

    /// Seconds between health scans.
    #[arg(long)]
    check_interval: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control plane: scheduler, health monitor, and REST API.
    Serve(Overrides),
    /// Print the effective configuration as TOML.
    Config(Overrides),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve(overrides) => run_serve(load_config(overrides)?).await,
        Command::Config(overrides) => {
            print!("{}", load_config(overrides)?.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Read the config file (if any) and apply CLI overrides on top.
fn load_config(overrides: Overrides) -> anyhow::Result<DaemonConfig> {
    let mut config = match &overrides.config {
        Some(path) => DaemonConfig::from_file(path)?,
        None => DaemonConfig::default(),
    };

    if let Some(bind) = overrides.bind {
        config.server.bind = bind;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(algorithm) = overrides.algorithm {
        config.scheduler.algorithm = algorithm;
    }
    if let Some(secs) = overrides.heartbeat_timeout {
        config.health.heartbeat_timeout_secs = secs;
    }
    if let Some(secs) = overrides.check_interval {
        config.health.check_interval_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

async fn run_serve(config: DaemonConfig) -> anyhow::Result<()> {
    info!("podgrid daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::new();

    let driver = Arc::new(SimDriver::new().with_latency(config.driver_latency()));
    info!(latency = ?config.driver_latency(), "simulated runtime driver initialized");

    let scheduler = Arc::new(Scheduler::new(
        store,
        driver,
        config.scheduler_config(),
    ));

    for node in &config.nodes {
        scheduler
            .add_node(&node.id, node.capacity, node.labels.clone())
            .await
            .with_context(|| format!("bootstrapping node {}", node.id))?;
    }
    info!(nodes = config.nodes.len(), "bootstrap nodes added");

    let monitor = HealthMonitor::new(Arc::clone(&scheduler), config.monitor_config());

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let health_shutdown = shutdown_rx.clone();
    let health_handle = tokio::spawn(async move {
        monitor.run(health_shutdown).await;
    });

    let agents_handle = config.driver.agent_heartbeat_secs.map(|secs| {
        let nodes = config.nodes.iter().map(|n| n.id.clone()).collect();
        tokio::spawn(agents::run_heartbeats(
            Arc::clone(&scheduler),
            nodes,
            std::time::Duration::from_secs(secs),
            shutdown_rx.clone(),
        ))
    });

    // ── Start API server ───────────────────────────────────────

    let router = podgrid_api::build_router(scheduler);
    let addr = config.listen_addr();

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = health_handle.await;
    if let Some(handle) = agents_handle {
        let _ = handle.await;
    }

    info!("podgrid daemon stopped");
    Ok(())
}
