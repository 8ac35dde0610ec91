//! Health monitor — periodic heartbeat scan with pod relocation.
//!
//! `check_at` performs one scan against an explicit clock so tests can
//! drive failures deterministically; `run` calls it on every tick until
//! the shutdown signal fires.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use podgrid_scheduler::{Scheduler, SchedulerError};

use crate::report::{PodOutcome, ScanReport};

/// Health monitor tunables.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often nodes are scanned.
    pub check_interval: Duration,
    /// Silence after which a node is considered failed.
    pub heartbeat_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(15),
        }
    }
}

/// Detects stale nodes and relocates their pods.
pub struct HealthMonitor {
    scheduler: Arc<Scheduler>,
    config: MonitorConfig,
}

impl HealthMonitor {
    pub fn new(scheduler: Arc<Scheduler>, config: MonitorConfig) -> Self {
        Self { scheduler, config }
    }

    /// Run one scan against the wall clock.
    pub async fn check_now(&self) -> ScanReport {
        self.check_at(epoch_secs()).await
    }

    /// Run one scan as if the current time were `now`.
    pub async fn check_at(&self, now: u64) -> ScanReport {
        let view = self.scheduler.view();
        let nodes = view.list_nodes();
        let mut report = ScanReport {
            scanned: nodes.len(),
            ..ScanReport::default()
        };

        for node in nodes {
            let hosted = match self.scheduler.fail_node_if_stale(
                &node.id,
                now,
                self.config.heartbeat_timeout,
            ) {
                Ok(Some(hosted)) => hosted,
                Ok(None) => continue,
                Err(e) => {
                    // Removed since the listing was taken.
                    debug!(node_id = %node.id, error = %e, "skipping node");
                    continue;
                }
            };

            warn!(node_id = %node.id, pods = hosted.len(), "node failed, relocating pods");
            report.failed_nodes.push(node.id.clone());

            for workload_id in hosted {
                // A concurrent request may have moved or removed it already.
                let still_here = view
                    .get_workload(&workload_id)
                    .is_some_and(|w| w.node_id.as_deref() == Some(node.id.as_str()));
                if !still_here {
                    debug!(pod = %workload_id, node_id = %node.id, "pod left the node, skipping");
                    continue;
                }

                let outcome = self.relocate(&workload_id).await;
                report.pods.push((workload_id, outcome));
            }
        }

        if !report.is_quiet() {
            info!(
                failed_nodes = report.failed_nodes.len(),
                relocated = report.relocated(),
                pending = report.pending(),
                failed = report.failed(),
                "health scan complete"
            );
        }
        report
    }

    async fn relocate(&self, workload_id: &str) -> PodOutcome {
        match self.scheduler.reschedule_pod(workload_id).await {
            Ok(relocation) => PodOutcome::Relocated { to: relocation.to },
            Err(SchedulerError::NoCapacity { demand }) => {
                warn!(pod = %workload_id, demand, "no capacity to relocate pod, left pending");
                PodOutcome::Pending
            }
            Err(e) => {
                warn!(pod = %workload_id, error = %e, "pod relocation failed");
                PodOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Scan every `check_interval` until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.check_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            check_interval = ?period,
            heartbeat_timeout = ?self.config.heartbeat_timeout,
            "health monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_now().await;
                }
                _ = shutdown.changed() => {
                    debug!("health monitor shutting down");
                    break;
                }
            }
        }

        info!("health monitor stopped");
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
