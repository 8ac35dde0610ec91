//! Simulated node agents.
//!
//! With the simulated driver there is no process on the node side to send
//! heartbeats. When `driver.agent_heartbeat_secs` is set, one loop beats
//! for every bootstrap node. The agent of a removed node stops on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use podgrid_scheduler::{Scheduler, SchedulerError};
use podgrid_state::NodeId;

/// Send a heartbeat for each of `nodes` every `interval` until shutdown.
pub async fn run_heartbeats(
    scheduler: Arc<Scheduler>,
    mut nodes: Vec<NodeId>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(nodes = nodes.len(), ?interval, "simulated node agents started");
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                nodes.retain(|node_id| match scheduler.record_heartbeat(node_id) {
                    Ok(_) => true,
                    Err(SchedulerError::NodeNotFound(_)) => {
                        debug!(%node_id, "node removed, agent stopped");
                        false
                    }
                    Err(_) => true,
                });
            }
            _ = shutdown.changed() => {
                break;
            }
        }
    }

    info!("simulated node agents stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_driver::SimDriver;
    use podgrid_scheduler::SchedulerConfig;
    use podgrid_state::{Labels, StateStore};

    #[tokio::test]
    async fn agents_keep_nodes_fresh_and_stop_on_shutdown() {
        let scheduler = Arc::new(Scheduler::new(
            StateStore::new(),
            Arc::new(SimDriver::new()),
            SchedulerConfig::default(),
        ));
        let node = scheduler.add_node("n1", 4, Labels::new()).await.unwrap();
        let stale = node.last_heartbeat + 100;
        scheduler
            .fail_node_if_stale("n1", stale, Duration::from_secs(15))
            .unwrap();
        assert!(!scheduler.view().get_node("n1").unwrap().is_healthy());

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_heartbeats(
            Arc::clone(&scheduler),
            vec!["n1".to_string(), "ghost".to_string()],
            Duration::from_millis(10),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.view().get_node("n1").unwrap().is_healthy());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
