//! SimDriver — an in-process runtime driver.
//!
//! Units are plain records in a map. Latency and failures can be injected,
//! which is how the daemon runs without a container engine and how the
//! scheduler's compensation paths are exercised in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::driver::{LabelHints, RuntimeDriver, UnitId};
use crate::error::{DriverError, DriverResult};

/// What a simulated unit backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Node,
    Workload,
}

/// A live simulated unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimUnit {
    pub kind: UnitKind,
    /// Host node, for pod units.
    pub node_id: Option<String>,
    pub labels: LabelHints,
}

/// In-process driver with injectable latency and failures.
#[derive(Debug, Default)]
pub struct SimDriver {
    units: Mutex<HashMap<UnitId, SimUnit>>,
    next_id: AtomicU64,
    latency: Duration,
    /// Number of upcoming provision calls that fail.
    failing_provisions: AtomicU32,
    failing_destroys: AtomicBool,
}

impl SimDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next `count` provision calls fail.
    pub fn fail_next_provisions(&self, count: u32) {
        self.failing_provisions.store(count, Ordering::SeqCst);
    }

    /// Make every destroy call fail until switched off again.
    pub fn fail_destroys(&self, fail: bool) {
        self.failing_destroys.store(fail, Ordering::SeqCst);
    }

    /// Number of live units.
    pub fn unit_count(&self) -> usize {
        self.lock().len()
    }

    pub fn unit(&self, unit_id: &str) -> Option<SimUnit> {
        self.lock().get(unit_id).cloned()
    }

    /// Drop a unit behind the scheduler's back, as an external actor would.
    pub fn vanish(&self, unit_id: &str) -> bool {
        self.lock().remove(unit_id).is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UnitId, SimUnit>> {
        self.units.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Consume one injected provision failure, if any are armed.
    fn take_provision_failure(&self) -> bool {
        self.failing_provisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn create(&self, kind: UnitKind, node_id: Option<&str>, labels: &LabelHints) -> DriverResult<UnitId> {
        if self.take_provision_failure() {
            warn!(?kind, "simulated provision failure");
            return Err(DriverError::Provision("simulated failure".to_string()));
        }
        let prefix = match kind {
            UnitKind::Node => "sim-node",
            UnitKind::Workload => "sim-pod",
        };
        let unit_id = format!("{prefix}-{:06}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock().insert(
            unit_id.clone(),
            SimUnit {
                kind,
                node_id: node_id.map(str::to_string),
                labels: labels.clone(),
            },
        );
        debug!(%unit_id, ?kind, "unit provisioned");
        Ok(unit_id)
    }
}

#[async_trait]
impl RuntimeDriver for SimDriver {
    async fn provision_node_unit(&self, labels: &LabelHints) -> DriverResult<UnitId> {
        self.simulate_latency().await;
        self.create(UnitKind::Node, None, labels)
    }

    async fn provision_workload_unit(
        &self,
        node_id: &str,
        labels: &LabelHints,
    ) -> DriverResult<UnitId> {
        self.simulate_latency().await;
        self.create(UnitKind::Workload, Some(node_id), labels)
    }

    async fn destroy_unit(&self, unit_id: &str) -> DriverResult<()> {
        self.simulate_latency().await;
        if self.failing_destroys.load(Ordering::SeqCst) {
            warn!(%unit_id, "simulated destroy failure");
            return Err(DriverError::Destroy(format!("simulated failure for {unit_id}")));
        }
        match self.lock().remove(unit_id) {
            Some(_) => {
                debug!(%unit_id, "unit destroyed");
                Ok(())
            }
            None => Err(DriverError::NotFound(unit_id.to_string())),
        }
    }

    async fn inspect_unit(&self, unit_id: &str) -> DriverResult<UnitId> {
        self.simulate_latency().await;
        if self.lock().contains_key(unit_id) {
            Ok(unit_id.to_string())
        } else {
            Err(DriverError::NotFound(unit_id.to_string()))
        }
    }
}
