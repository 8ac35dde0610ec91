//! podgridd.toml configuration.
//!
//! Every section is optional; missing fields take the defaults below.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 8080
//!
//! [scheduler]
//! algorithm = "best-fit"
//! driver_timeout_secs = 10
//!
//! [health]
//! check_interval_secs = 5
//! heartbeat_timeout_secs = 15
//!
//! [driver]
//! latency_ms = 0
//! agent_heartbeat_secs = 5
//!
//! [[nodes]]
//! id = "node-a"
//! capacity = 8
//! labels = { zone = "eu-1" }
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize};

use podgrid_health::MonitorConfig;
use podgrid_placement::PlacementAlgorithm;
use podgrid_scheduler::SchedulerConfig;
use podgrid_state::Labels;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerSection,
    pub health: HealthSection,
    pub driver: DriverSection,
    pub nodes: Vec<BootstrapNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub algorithm: PlacementAlgorithm,
    pub driver_timeout_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            algorithm: PlacementAlgorithm::FirstFit,
            driver_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSection {
    pub check_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            heartbeat_timeout_secs: 15,
        }
    }
}

/// Simulated runtime driver settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSection {
    /// Delay added to every driver call.
    pub latency_ms: u64,
    /// When set, bootstrap nodes heartbeat on their own at this interval.
    pub agent_heartbeat_secs: Option<u64>,
}

/// A node added at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapNode {
    pub id: String,
    pub capacity: u32,
    #[serde(default)]
    pub labels: Labels,
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.scheduler.driver_timeout_secs > 0, "scheduler.driver_timeout_secs must be positive");
        ensure!(self.health.check_interval_secs > 0, "health.check_interval_secs must be positive");
        ensure!(self.health.heartbeat_timeout_secs > 0, "health.heartbeat_timeout_secs must be positive");
        ensure!(
            self.driver.agent_heartbeat_secs != Some(0),
            "driver.agent_heartbeat_secs must be positive"
        );
        for node in &self.nodes {
            ensure!(node.capacity > 0, "node {} needs a positive capacity", node.id);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind, self.server.port)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            algorithm: self.scheduler.algorithm,
            driver_timeout: Duration::from_secs(self.scheduler.driver_timeout_secs),
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            check_interval: Duration::from_secs(self.health.check_interval_secs),
            heartbeat_timeout: Duration::from_secs(self.health.heartbeat_timeout_secs),
        }
    }

    pub fn driver_latency(&self) -> Duration {
        Duration::from_millis(self.driver.latency_ms)
    }
}
