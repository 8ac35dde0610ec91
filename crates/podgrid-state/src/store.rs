//! StateStore — in-memory cluster state for podgrid.
//!
//! `ClusterState` owns the two collections (nodes and pods) and keeps the
//! node ↔ pod relation and the capacity accounting consistent on every
//! mutation. It also carries a reservation ledger for in-flight placements;
//! reservations count against placement but never show up in node records,
//! so readers only ever see committed state.
//!
//! `StateStore` is the writer handle (held by the scheduler) and
//! `StateView` is the read-only handle handed to everything else. Both are
//! cheap `Clone`s over the same `Arc<RwLock<ClusterState>>`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::types::*;

/// Capacity held for a pod whose backing unit is still being provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub node_id: NodeId,
    pub cpu: u32,
}

/// Authoritative node and pod collections plus the reservation ledger.
#[derive(Debug, Default)]
pub struct ClusterState {
    nodes: HashMap<NodeId, Node>,
    /// Node insertion order, used for listings and placement tie-breaks.
    node_order: Vec<NodeId>,
    workloads: HashMap<WorkloadId, Workload>,
    workload_order: Vec<WorkloadId>,
    reservations: HashMap<WorkloadId, Reservation>,
    /// Node ids claimed by an in-flight add.
    pending_nodes: HashSet<NodeId>,
}

impl ClusterState {
    // ── Lookups ────────────────────────────────────────────────────

    pub fn get_node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_workload(&self, workload_id: &str) -> Option<&Workload> {
        self.workloads.get(workload_id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// All pods in creation order.
    pub fn workloads(&self) -> impl Iterator<Item = &Workload> {
        self.workload_order
            .iter()
            .filter_map(|id| self.workloads.get(id))
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Claim a node id for an add that is about to call the driver.
    pub fn claim_node_id(&mut self, node_id: &str) -> StateResult<()> {
        if self.nodes.contains_key(node_id) || self.pending_nodes.contains(node_id) {
            return Err(StateError::DuplicateNode(node_id.to_string()));
        }
        self.pending_nodes.insert(node_id.to_string());
        Ok(())
    }

    /// Give back a claimed node id after a failed add.
    pub fn release_node_id(&mut self, node_id: &str) {
        self.pending_nodes.remove(node_id);
    }

    pub fn insert_node(&mut self, node: Node) -> StateResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(StateError::DuplicateNode(node.id));
        }
        self.pending_nodes.remove(&node.id);
        self.node_order.push(node.id.clone());
        debug!(node_id = %node.id, capacity = node.total_capacity, "node stored");
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove an empty node. Refused while it hosts pods or is the target
    /// of an in-flight reservation.
    pub fn remove_node(&mut self, node_id: &str) -> StateResult<Node> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| StateError::NodeNotFound(node_id.to_string()))?;
        if !node.workload_ids.is_empty() {
            return Err(StateError::NodeBusy {
                node_id: node_id.to_string(),
                workloads: node.workload_ids.len(),
            });
        }
        if self.reserved_on(node_id) > 0 {
            return Err(StateError::NodeReserved(node_id.to_string()));
        }
        self.node_order.retain(|id| id != node_id);
        let node = self
            .nodes
            .remove(node_id)
            .ok_or_else(|| StateError::NodeNotFound(node_id.to_string()))?;
        debug!(%node_id, "node removed from store");
        Ok(node)
    }

    /// Record a heartbeat: refresh the timestamp and mark the node healthy.
    pub fn touch_node(&mut self, node_id: &str, now: u64) -> StateResult<()> {
        let node = self.node_mut(node_id)?;
        node.last_heartbeat = now;
        node.status = NodeStatus::Healthy;
        Ok(())
    }

    pub fn set_node_status(&mut self, node_id: &str, status: NodeStatus) -> StateResult<()> {
        self.node_mut(node_id)?.status = status;
        Ok(())
    }

    /// Change a node's total capacity, keeping its current usage.
    ///
    /// The caller must have checked that `total_capacity` covers usage.
    pub fn resize_node(&mut self, node_id: &str, total_capacity: u32) -> StateResult<()> {
        let node = self.node_mut(node_id)?;
        let used = node.used_capacity();
        debug_assert!(total_capacity >= used);
        node.total_capacity = total_capacity;
        node.available_capacity = total_capacity.saturating_sub(used);
        Ok(())
    }

    fn node_mut(&mut self, node_id: &str) -> StateResult<&mut Node> {
        self.nodes
            .get_mut(node_id)
            .ok_or_else(|| StateError::NodeNotFound(node_id.to_string()))
    }

    // ── Workloads ──────────────────────────────────────────────────

    /// Insert a pod. If it names a node, the relation and the node's
    /// capacity are updated in the same step.
    pub fn insert_workload(&mut self, mut workload: Workload) -> StateResult<()> {
        if self.workloads.contains_key(&workload.id) {
            return Err(StateError::DuplicateWorkload(workload.id));
        }
        if let Some(node_id) = &workload.node_id {
            if !self.nodes.contains_key(node_id) {
                return Err(StateError::NodeNotFound(node_id.clone()));
            }
        }

        let id = workload.id.clone();
        let target = workload.node_id.take();
        self.workload_order.push(id.clone());
        self.workloads.insert(id.clone(), workload);
        if let Some(node_id) = target {
            self.attach(&id, &node_id)?;
        }
        Ok(())
    }

    /// Remove a pod, releasing its capacity on the hosting node first.
    pub fn remove_workload(&mut self, workload_id: &str) -> StateResult<Workload> {
        self.detach(workload_id)?;
        self.workload_order.retain(|id| id != workload_id);
        self.reservations.remove(workload_id);
        self.workloads
            .remove(workload_id)
            .ok_or_else(|| StateError::WorkloadNotFound(workload_id.to_string()))
    }

    /// Attach a pod to a node: set `node_id`, append to `workload_ids`,
    /// and claim the pod's demand. A pod attached elsewhere is detached
    /// first.
    pub fn attach(&mut self, workload_id: &str, node_id: &str) -> StateResult<()> {
        if !self.nodes.contains_key(node_id) {
            return Err(StateError::NodeNotFound(node_id.to_string()));
        }
        self.detach(workload_id)?;

        let workload = self
            .workloads
            .get_mut(workload_id)
            .ok_or_else(|| StateError::WorkloadNotFound(workload_id.to_string()))?;
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| StateError::NodeNotFound(node_id.to_string()))?;

        debug_assert!(node.available_capacity >= workload.cpu_requirement);
        node.available_capacity = node
            .available_capacity
            .saturating_sub(workload.cpu_requirement);
        node.workload_ids.push(workload_id.to_string());
        workload.node_id = Some(node_id.to_string());
        debug!(%workload_id, %node_id, "pod attached");
        Ok(())
    }

    /// Detach a pod from its node and give the capacity back. Returns the
    /// node it was attached to, if any.
    pub fn detach(&mut self, workload_id: &str) -> StateResult<Option<NodeId>> {
        let workload = self
            .workloads
            .get_mut(workload_id)
            .ok_or_else(|| StateError::WorkloadNotFound(workload_id.to_string()))?;
        let Some(node_id) = workload.node_id.take() else {
            return Ok(None);
        };
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.workload_ids.retain(|id| id != workload_id);
            node.available_capacity = node
                .available_capacity
                .saturating_add(workload.cpu_requirement)
                .min(node.total_capacity);
        }
        debug!(%workload_id, %node_id, "pod detached");
        Ok(Some(node_id))
    }

    /// Change a pod's demand, moving the difference on its node.
    ///
    /// The caller must have checked that the node can absorb an increase.
    pub fn resize_workload(&mut self, workload_id: &str, cpu: u32, now: u64) -> StateResult<()> {
        let workload = self
            .workloads
            .get_mut(workload_id)
            .ok_or_else(|| StateError::WorkloadNotFound(workload_id.to_string()))?;
        let old = workload.cpu_requirement;
        workload.cpu_requirement = cpu;
        workload.updated_at = now;

        if let Some(node) = workload.node_id.as_ref().and_then(|id| self.nodes.get_mut(id)) {
            if cpu > old {
                debug_assert!(node.available_capacity >= cpu - old);
                node.available_capacity = node.available_capacity.saturating_sub(cpu - old);
            } else {
                node.available_capacity = (node.available_capacity + (old - cpu)).min(node.total_capacity);
            }
        }
        Ok(())
    }

    pub fn set_workload_status(
        &mut self,
        workload_id: &str,
        status: WorkloadStatus,
        now: u64,
    ) -> StateResult<()> {
        let workload = self.workload_mut(workload_id)?;
        workload.status = status;
        workload.updated_at = now;
        Ok(())
    }

    pub fn set_workload_unit(&mut self, workload_id: &str, unit: UnitId) -> StateResult<()> {
        self.workload_mut(workload_id)?.runtime_unit_id = unit;
        Ok(())
    }

    fn workload_mut(&mut self, workload_id: &str) -> StateResult<&mut Workload> {
        self.workloads
            .get_mut(workload_id)
            .ok_or_else(|| StateError::WorkloadNotFound(workload_id.to_string()))
    }

    // ── Reservations ───────────────────────────────────────────────

    /// Hold `cpu` units on a node for a pod that is being provisioned.
    pub fn reserve(&mut self, workload_id: &str, node_id: &str, cpu: u32) -> StateResult<()> {
        if !self.nodes.contains_key(node_id) {
            return Err(StateError::NodeNotFound(node_id.to_string()));
        }
        self.reservations.insert(
            workload_id.to_string(),
            Reservation {
                node_id: node_id.to_string(),
                cpu,
            },
        );
        debug!(%workload_id, %node_id, cpu, "capacity reserved");
        Ok(())
    }

    /// Drop a reservation, on commit or on compensation.
    pub fn release_reservation(&mut self, workload_id: &str) -> Option<Reservation> {
        let released = self.reservations.remove(workload_id);
        if let Some(r) = &released {
            debug!(%workload_id, node_id = %r.node_id, cpu = r.cpu, "reservation released");
        }
        released
    }

    /// Units reserved on a node by in-flight placements.
    pub fn reserved_on(&self, node_id: &str) -> u32 {
        self.reservations
            .values()
            .filter(|r| r.node_id == node_id)
            .map(|r| r.cpu)
            .sum()
    }

    /// Capacity a new placement may claim: available minus reservations.
    pub fn schedulable_capacity(&self, node_id: &str) -> Option<u32> {
        self.nodes
            .get(node_id)
            .map(|n| n.available_capacity.saturating_sub(self.reserved_on(node_id)))
    }

    // ── Consistency ────────────────────────────────────────────────

    /// Check the capacity and relation invariants. Returns one message per
    /// violation; an empty list means the state is consistent.
    pub fn verify(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for node in self.nodes() {
            let mut hosted: u64 = 0;
            for wid in &node.workload_ids {
                match self.workloads.get(wid) {
                    Some(w) => {
                        hosted += u64::from(w.cpu_requirement);
                        if w.node_id.as_deref() != Some(node.id.as_str()) {
                            violations.push(format!(
                                "node {} lists pod {} which points at {:?}",
                                node.id, wid, w.node_id
                            ));
                        }
                    }
                    None => violations.push(format!("node {} lists unknown pod {}", node.id, wid)),
                }
            }
            if u64::from(node.available_capacity) + hosted != u64::from(node.total_capacity) {
                violations.push(format!(
                    "node {}: available {} + hosted {} != total {}",
                    node.id, node.available_capacity, hosted, node.total_capacity
                ));
            }
        }

        for w in self.workloads() {
            if let Some(node_id) = &w.node_id {
                match self.nodes.get(node_id) {
                    Some(n) if n.workload_ids.contains(&w.id) => {}
                    Some(_) => violations.push(format!("pod {} missing from node {}", w.id, node_id)),
                    None => violations.push(format!("pod {} points at unknown node {}", w.id, node_id)),
                }
            }
        }

        violations
    }

    pub fn summary(&self) -> ClusterSummary {
        let mut summary = ClusterSummary::default();
        for node in self.nodes() {
            summary.nodes += 1;
            if node.is_healthy() {
                summary.healthy_nodes += 1;
            }
            summary.total_capacity += u64::from(node.total_capacity);
            summary.available_capacity += u64::from(node.available_capacity);
        }
        for w in self.workloads() {
            summary.pods += 1;
            match w.status {
                WorkloadStatus::Running => summary.running_pods += 1,
                WorkloadStatus::Pending => summary.pending_pods += 1,
                WorkloadStatus::Error => summary.error_pods += 1,
            }
        }
        summary
    }
}

// ── Handles ──────────────────────────────────────────────────────

/// Writer handle over the cluster state. Only the scheduler holds one.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<ClusterState>>,
}

impl StateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        debug!("cluster state store created");
        Self::default()
    }

    /// A read-only handle over the same state.
    pub fn view(&self) -> StateView {
        StateView {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Run `f` under the write lock. Everything `f` does is observed by
    /// readers as one step.
    pub fn write<R>(&self, f: impl FnOnce(&mut ClusterState) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ClusterState) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

/// Read-only handle over the cluster state. Every lookup returns a copy.
#[derive(Clone)]
pub struct StateView {
    inner: Arc<RwLock<ClusterState>>,
}

impl StateView {
    fn read<R>(&self, f: impl FnOnce(&ClusterState) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn get_node(&self, node_id: &str) -> Option<Node> {
        self.read(|s| s.get_node(node_id).cloned())
    }

    pub fn get_workload(&self, workload_id: &str) -> Option<Workload> {
        self.read(|s| s.get_workload(workload_id).cloned())
    }

    pub fn list_nodes(&self) -> Vec<Node> {
        self.read(|s| s.nodes().cloned().collect())
    }

    pub fn list_workloads(&self) -> Vec<Workload> {
        self.read(|s| s.workloads().cloned().collect())
    }

    /// Pods hosted by a node, in attach order.
    pub fn workloads_on(&self, node_id: &str) -> Vec<Workload> {
        self.read(|s| {
            s.get_node(node_id)
                .map(|n| {
                    n.workload_ids
                        .iter()
                        .filter_map(|id| s.get_workload(id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    pub fn summary(&self) -> ClusterSummary {
        self.read(ClusterState::summary)
    }

    pub fn verify(&self) -> Vec<String> {
        self.read(ClusterState::verify)
    }
}
