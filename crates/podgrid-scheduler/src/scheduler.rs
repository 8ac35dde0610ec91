//! Scheduler — places pods on nodes and keeps the books straight.
//!
//! The `Scheduler` is the single writer of the cluster state:
//! - Adds, resizes, and removes nodes (with their backing units)
//! - Creates, resizes, removes, and relocates pods
//! - Records heartbeats and marks stale nodes unhealthy
//!
//! A driver failure during create or relocate is compensated before the
//! error is returned. A driver failure during teardown is logged and
//! reported as `Cleanup::Failed`, never as an error.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use podgrid_driver::{BoundedDriver, LabelHints, RuntimeDriver};
use podgrid_placement::{AlgorithmCell, PlacementAlgorithm, candidates_from_state, select_node};
use podgrid_state::*;

use crate::error::{SchedulerError, SchedulerResult};
use crate::locks::KeyedLocks;
use crate::outcome::{Cleanup, NodeRemoval, Relocation, Removal, UnitAudit};

/// Label hint carrying the node id.
const NODE_LABEL: &str = "podgrid.node";
/// Label hint carrying the pod id.
const POD_LABEL: &str = "podgrid.pod";

/// Scheduler tunables.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Placement algorithm active at startup.
    pub algorithm: PlacementAlgorithm,
    /// Upper bound on any single driver call.
    pub driver_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: PlacementAlgorithm::FirstFit,
            driver_timeout: Duration::from_secs(10),
        }
    }
}

/// Relocation decided under the lock, before the driver is called.
struct RelocationPlan {
    before: Workload,
    from: Option<NodeId>,
    target: Option<NodeId>,
}

/// The scheduler owns all mutations of the cluster state.
pub struct Scheduler {
    store: StateStore,
    driver: BoundedDriver,
    algorithm: AlgorithmCell,
    /// Serializes operations on the same pod.
    pod_locks: KeyedLocks,
}

impl Scheduler {
    /// Create a new scheduler over `store`, calling `driver` for units.
    pub fn new(store: StateStore, driver: Arc<dyn RuntimeDriver>, config: SchedulerConfig) -> Self {
        info!(
            algorithm = %config.algorithm,
            driver_timeout = ?config.driver_timeout,
            "scheduler initialized"
        );
        Self {
            store,
            driver: BoundedDriver::new(driver, config.driver_timeout),
            algorithm: AlgorithmCell::new(config.algorithm),
            pod_locks: KeyedLocks::new(),
        }
    }

    /// Read-only handle over the state this scheduler maintains.
    pub fn view(&self) -> StateView {
        self.store.view()
    }

    pub fn algorithm(&self) -> PlacementAlgorithm {
        self.algorithm.get()
    }

    /// Switch the placement algorithm. Returns the previous one.
    pub fn set_algorithm(&self, algorithm: PlacementAlgorithm) -> PlacementAlgorithm {
        self.algorithm.set(algorithm)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Add a node after provisioning its backing unit.
    ///
    /// The id is claimed before the driver is called, so a concurrent add
    /// with the same id fails with `Conflict` instead of racing.
    pub async fn add_node(
        &self,
        node_id: &str,
        capacity: u32,
        labels: Labels,
    ) -> SchedulerResult<Node> {
        if node_id.trim().is_empty() {
            return Err(SchedulerError::InvalidArgument("node id must not be empty".to_string()));
        }
        if capacity == 0 {
            return Err(SchedulerError::InvalidArgument(
                "node capacity must be positive".to_string(),
            ));
        }

        self.store.write(|s| s.claim_node_id(node_id))?;

        let mut hints = labels.clone();
        hints.insert(NODE_LABEL.to_string(), node_id.to_string());

        let unit_id = match self.driver.provision_node_unit(&hints).await {
            Ok(unit_id) => unit_id,
            Err(e) => {
                self.store.write(|s| s.release_node_id(node_id));
                warn!(%node_id, error = %e, "node unit provisioning failed");
                return Err(SchedulerError::ProvisionFailed(e));
            }
        };

        let mut node = Node::new(node_id, capacity, unit_id, epoch_secs());
        node.labels = labels;

        if let Err(e) = self.store.write(|s| s.insert_node(node.clone())) {
            self.store.write(|s| s.release_node_id(node_id));
            error!(%node_id, error = %e, "failed to commit node, destroying its unit");
            self.destroy_unit(&node.runtime_unit_id).await;
            return Err(e.into());
        }

        info!(%node_id, capacity, unit = %node.runtime_unit_id, "node added");
        Ok(node)
    }

    /// Change a node's total capacity. Refused if the new total would not
    /// cover the pods it hosts plus in-flight reservations.
    pub fn update_node(&self, node_id: &str, total_capacity: u32) -> SchedulerResult<Node> {
        if total_capacity == 0 {
            return Err(SchedulerError::InvalidArgument(
                "node capacity must be positive".to_string(),
            ));
        }

        let node = self.store.write(|s| {
            let node = s
                .get_node(node_id)
                .ok_or_else(|| SchedulerError::NodeNotFound(node_id.to_string()))?;
            let committed = node.used_capacity() + s.reserved_on(node_id);
            if total_capacity < committed {
                return Err(SchedulerError::InsufficientCapacity {
                    node_id: node_id.to_string(),
                    requested: committed,
                    available: total_capacity,
                });
            }
            s.resize_node(node_id, total_capacity)?;
            s.get_node(node_id)
                .cloned()
                .ok_or_else(|| SchedulerError::NodeNotFound(node_id.to_string()))
        })?;

        info!(%node_id, total_capacity, "node capacity updated");
        Ok(node)
    }

    /// Remove an empty node and destroy its backing unit (best-effort).
    pub async fn remove_node(&self, node_id: &str) -> SchedulerResult<NodeRemoval> {
        let node = self.store.write(|s| s.remove_node(node_id))?;
        let cleanup = self.destroy_unit(&node.runtime_unit_id).await;
        info!(%node_id, ?cleanup, "node removed");
        Ok(NodeRemoval { node, cleanup })
    }

    /// Record a heartbeat now.
    pub fn record_heartbeat(&self, node_id: &str) -> SchedulerResult<Node> {
        self.record_heartbeat_at(node_id, epoch_secs())
    }

    /// Record a heartbeat at `now`: refresh the timestamp and restore
    /// `healthy` unconditionally.
    pub fn record_heartbeat_at(&self, node_id: &str, now: u64) -> SchedulerResult<Node> {
        let (node, recovered) = self.store.write(|s| {
            let was_healthy = s.get_node(node_id).map(Node::is_healthy);
            s.touch_node(node_id, now)?;
            let node = s
                .get_node(node_id)
                .cloned()
                .ok_or_else(|| SchedulerError::NodeNotFound(node_id.to_string()))?;
            Ok::<_, SchedulerError>((node, was_healthy == Some(false)))
        })?;

        if recovered {
            info!(%node_id, "node recovered");
        } else {
            debug!(%node_id, "heartbeat received");
        }
        Ok(node)
    }

    /// Mark a node unhealthy if, checked under the lock, it is healthy and
    /// its last heartbeat is older than `timeout` at `now`.
    ///
    /// Returns the pods it hosted at that moment, or `None` when the node
    /// was not transitioned.
    pub fn fail_node_if_stale(
        &self,
        node_id: &str,
        now: u64,
        timeout: Duration,
    ) -> SchedulerResult<Option<Vec<WorkloadId>>> {
        self.store.write(|s| {
            let node = s
                .get_node(node_id)
                .ok_or_else(|| SchedulerError::NodeNotFound(node_id.to_string()))?;
            let silent_for = now.saturating_sub(node.last_heartbeat);
            if !node.is_healthy() || silent_for <= timeout.as_secs() {
                return Ok(None);
            }
            let hosted = node.workload_ids.clone();
            s.set_node_status(node_id, NodeStatus::Unhealthy)?;
            warn!(%node_id, silent_for, pods = hosted.len(), "node marked unhealthy");
            Ok(Some(hosted))
        })
    }

    // ── Pods ───────────────────────────────────────────────────────

    /// Place a new pod.
    ///
    /// Capacity is reserved on the chosen node, the unit is provisioned,
    /// and the pod is committed as `running`. If provisioning fails, or the
    /// node turned unhealthy in the meantime, the reservation is dropped,
    /// any new unit destroyed, and the state is exactly as before the call.
    pub async fn create_workload(
        &self,
        cpu_requirement: u32,
        labels: Labels,
    ) -> SchedulerResult<Workload> {
        validate_demand(cpu_requirement)?;
        let workload_id = format!("pod-{}", Uuid::new_v4().simple());

        let node_id = self.store.write(|s| {
            let node_id = select_node(cpu_requirement, &candidates_from_state(s), self.algorithm.get())
                .ok_or(SchedulerError::NoCapacity {
                    demand: cpu_requirement,
                })?;
            s.reserve(&workload_id, &node_id, cpu_requirement)?;
            Ok::<_, SchedulerError>(node_id)
        })?;

        let hints = pod_hints(&workload_id, &node_id, &labels);
        let unit_id = match self.driver.provision_workload_unit(&node_id, &hints).await {
            Ok(unit_id) => unit_id,
            Err(e) => {
                self.store.write(|s| s.release_reservation(&workload_id));
                warn!(pod = %workload_id, %node_id, error = %e, "pod provisioning failed, reservation rolled back");
                return Err(SchedulerError::ProvisionFailed(e));
            }
        };

        let now = epoch_secs();
        let workload = Workload {
            id: workload_id.clone(),
            cpu_requirement,
            node_id: Some(node_id.clone()),
            runtime_unit_id: unit_id,
            status: WorkloadStatus::Running,
            labels,
            created_at: now,
            updated_at: now,
        };

        let committed = self.store.write(|s| {
            s.release_reservation(&workload_id);
            ensure_placeable(s, &node_id)?;
            s.insert_workload(workload.clone()).map_err(SchedulerError::from)
        });
        if let Err(e) = committed {
            warn!(pod = %workload_id, %node_id, error = %e, "failed to commit pod, destroying its unit");
            self.destroy_unit(&workload.runtime_unit_id).await;
            return Err(e);
        }

        info!(pod = %workload_id, %node_id, cpu = cpu_requirement, "pod scheduled");
        Ok(workload)
    }

    /// Change a pod's demand. An increase must fit in its node's free
    /// capacity. The backing unit is not touched.
    pub async fn update_workload(
        &self,
        workload_id: &str,
        cpu_requirement: u32,
    ) -> SchedulerResult<Workload> {
        validate_demand(cpu_requirement)?;
        let _guard = self.pod_locks.lock(workload_id).await;

        let workload = self.store.write(|s| {
            let current = s
                .get_workload(workload_id)
                .ok_or_else(|| SchedulerError::WorkloadNotFound(workload_id.to_string()))?;

            if cpu_requirement > current.cpu_requirement {
                if let Some(node_id) = current.node_id.clone() {
                    let delta = cpu_requirement - current.cpu_requirement;
                    let available = s.schedulable_capacity(&node_id).unwrap_or(0);
                    if available < delta {
                        return Err(SchedulerError::InsufficientCapacity {
                            node_id,
                            requested: delta,
                            available,
                        });
                    }
                }
            }

            s.resize_workload(workload_id, cpu_requirement, epoch_secs())?;
            s.get_workload(workload_id)
                .cloned()
                .ok_or_else(|| SchedulerError::WorkloadNotFound(workload_id.to_string()))
        })?;

        info!(pod = %workload_id, cpu = cpu_requirement, "pod demand updated");
        Ok(workload)
    }

    /// Remove a pod. Capacity is released and the record dropped before
    /// the driver is asked to destroy the unit; a driver failure shows up
    /// only in the returned `Cleanup`.
    pub async fn remove_workload(&self, workload_id: &str) -> SchedulerResult<Removal> {
        let workload = {
            let _guard = self.pod_locks.lock(workload_id).await;
            self.store.write(|s| s.remove_workload(workload_id))?
        };

        let cleanup = self.destroy_unit(&workload.runtime_unit_id).await;
        info!(pod = %workload_id, node = ?workload.node_id, ?cleanup, "pod removed");
        Ok(Removal { workload, cleanup })
    }

    /// Move a pod to another node.
    ///
    /// The pod is detached (capacity released, status `pending`) and a new
    /// node is chosen. With no candidate the pod stays `pending` and
    /// `NoCapacity` is returned. Otherwise the new unit is provisioned;
    /// on success the pod is attached to the new node and its old unit is
    /// destroyed (best-effort). If the target failed while the unit was
    /// being provisioned, the new unit is destroyed and the move is undone.
    /// On failure the pod goes back to its original node if that node is
    /// still healthy and has room, waits `pending` if it is not, and is
    /// marked `error` with no node left to return to.
    ///
    /// Accepts pods in any status, which makes it the re-entry point for
    /// `pending` and `error` pods.
    pub async fn reschedule_pod(&self, workload_id: &str) -> SchedulerResult<Relocation> {
        let _guard = self.pod_locks.lock(workload_id).await;
        let now = epoch_secs();

        let plan = self.store.write(|s| {
            let before = s
                .get_workload(workload_id)
                .cloned()
                .ok_or_else(|| SchedulerError::WorkloadNotFound(workload_id.to_string()))?;
            let from = s.detach(workload_id)?;
            s.set_workload_status(workload_id, WorkloadStatus::Pending, now)?;

            let target = select_node(before.cpu_requirement, &candidates_from_state(s), self.algorithm.get());
            if let Some(node_id) = &target {
                s.reserve(workload_id, node_id, before.cpu_requirement)?;
            }
            Ok::<_, SchedulerError>(RelocationPlan { before, from, target })
        })?;

        let demand = plan.before.cpu_requirement;
        let Some(target) = plan.target.clone() else {
            warn!(pod = %workload_id, from = ?plan.from, demand, "no capacity for relocation, pod pending");
            return Err(SchedulerError::NoCapacity { demand });
        };

        let hints = pod_hints(workload_id, &target, &plan.before.labels);
        let provisioned = self.driver.provision_workload_unit(&target, &hints).await;

        let unit_id = match provisioned {
            Ok(unit_id) => unit_id,
            Err(e) => {
                let status = self.revert_relocation(workload_id, &plan);
                warn!(pod = %workload_id, %target, error = %e, ?status, "relocation provisioning failed, reverted");
                return Err(SchedulerError::ProvisionFailed(e));
            }
        };

        let committed = self.store.write(|s| {
            s.release_reservation(workload_id);
            ensure_placeable(s, &target)?;
            s.attach(workload_id, &target)?;
            s.set_workload_unit(workload_id, unit_id.clone())?;
            s.set_workload_status(workload_id, WorkloadStatus::Running, now)?;
            s.get_workload(workload_id)
                .cloned()
                .ok_or_else(|| SchedulerError::WorkloadNotFound(workload_id.to_string()))
        });

        let workload = match committed {
            Ok(workload) => workload,
            Err(e) => {
                self.destroy_unit(&unit_id).await;
                let status = self.revert_relocation(workload_id, &plan);
                warn!(pod = %workload_id, %target, error = %e, ?status, "failed to commit relocation, reverted");
                return Err(e);
            }
        };

        let cleanup = self.destroy_unit(&plan.before.runtime_unit_id).await;
        info!(pod = %workload_id, from = ?plan.from, to = %target, ?cleanup, "pod relocated");
        Ok(Relocation {
            workload,
            from: plan.from,
            to: target,
            cleanup,
        })
    }

    /// Undo a relocation whose provisioning or commit failed. The pod goes
    /// back to its origin only if that node is healthy and has room; an
    /// origin that is unhealthy or full leaves it `pending`. Returns the
    /// status the pod ends up in.
    fn revert_relocation(&self, workload_id: &str, plan: &RelocationPlan) -> WorkloadStatus {
        let demand = plan.before.cpu_requirement;
        let unit_id = plan.before.runtime_unit_id.clone();

        self.store.write(|s| {
            s.release_reservation(workload_id);
            // The failed attempt may have left the pod attached to the target.
            if let Err(e) = s.detach(workload_id) {
                error!(pod = %workload_id, error = %e, "revert: pod vanished under its lock");
                return WorkloadStatus::Error;
            }
            if let Err(e) = s.set_workload_unit(workload_id, unit_id) {
                error!(pod = %workload_id, error = %e, "revert: failed to restore unit id");
            }

            let status = match plan.from.as_deref() {
                Some(origin) => {
                    let room = s
                        .get_node(origin)
                        .map(|n| n.is_healthy() && s.schedulable_capacity(origin).unwrap_or(0) >= demand);
                    match room {
                        Some(true) => match s.attach(workload_id, origin) {
                            Ok(()) => plan.before.status,
                            Err(e) => {
                                error!(pod = %workload_id, %origin, error = %e, "revert: reattach failed");
                                WorkloadStatus::Pending
                            }
                        },
                        // The origin is still there but failed or filled up meanwhile.
                        Some(false) => WorkloadStatus::Pending,
                        None => WorkloadStatus::Error,
                    }
                }
                None => WorkloadStatus::Error,
            };

            if let Err(e) = s.set_workload_status(workload_id, status, epoch_secs()) {
                error!(pod = %workload_id, error = %e, "revert: failed to set status");
            }
            if status == WorkloadStatus::Error {
                error!(pod = %workload_id, "relocation failed with no node to fall back to, pod in error");
            }
            status
        })
    }

    // ── Units ──────────────────────────────────────────────────────

    /// Ask the driver about every unit the state refers to and report the
    /// ones it no longer knows. Read-only: leaked or vanished units are
    /// left for an operator to reconcile.
    pub async fn audit_units(&self) -> UnitAudit {
        let view = self.view();
        let mut audit = UnitAudit::default();

        for node in view.list_nodes() {
            audit.checked += 1;
            if let Err(e) = self.driver.inspect_unit(&node.runtime_unit_id).await {
                debug!(node_id = %node.id, error = %e, "node unit missing");
                audit.missing_node_units.push((node.id, node.runtime_unit_id));
            }
        }
        for pod in view.list_workloads() {
            if pod.status != WorkloadStatus::Running {
                continue;
            }
            audit.checked += 1;
            if let Err(e) = self.driver.inspect_unit(&pod.runtime_unit_id).await {
                debug!(pod = %pod.id, error = %e, "pod unit missing");
                audit.missing_pod_units.push((pod.id, pod.runtime_unit_id));
            }
        }

        if !audit.is_clean() {
            warn!(
                nodes = audit.missing_node_units.len(),
                pods = audit.missing_pod_units.len(),
                "units missing from the runtime driver"
            );
        }
        audit
    }

    /// Best-effort unit teardown.
    async fn destroy_unit(&self, unit_id: &str) -> Cleanup {
        match self.driver.destroy_unit(unit_id).await {
            Ok(()) => Cleanup::Destroyed,
            Err(e) if e.is_not_found() => {
                debug!(%unit_id, "unit already gone");
                Cleanup::AlreadyGone
            }
            Err(e) => {
                warn!(%unit_id, error = %e, "failed to destroy unit, it may have leaked");
                Cleanup::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// A node chosen before a driver call may have failed or gone away by the
/// time the result is committed.
fn ensure_placeable(state: &ClusterState, node_id: &str) -> SchedulerResult<()> {
    match state.get_node(node_id) {
        Some(node) if node.is_healthy() => Ok(()),
        Some(_) => Err(SchedulerError::Conflict(format!(
            "node {node_id} became unhealthy during provisioning"
        ))),
        None => Err(SchedulerError::NodeNotFound(node_id.to_string())),
    }
}

fn validate_demand(cpu_requirement: u32) -> SchedulerResult<()> {
    if cpu_requirement == 0 {
        return Err(SchedulerError::InvalidArgument(
            "cpu requirement must be positive".to_string(),
        ));
    }
    Ok(())
}

fn pod_hints(workload_id: &str, node_id: &str, labels: &Labels) -> LabelHints {
    let mut hints = labels.clone();
    hints.insert(POD_LABEL.to_string(), workload_id.to_string());
    hints.insert(NODE_LABEL.to_string(), node_id.to_string());
    hints
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
