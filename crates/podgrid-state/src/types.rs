//! Domain types for the podgrid state store.
//!
//! These types represent the cluster members (nodes) and the schedulable
//! units placed on them (pods). All types are serializable so the API
//! layer can hand them out as JSON unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Unique identifier for a pod.
pub type WorkloadId = String;

/// Opaque identifier handed out by the runtime driver.
pub type UnitId = String;

/// Free-form labels, forwarded to the runtime driver as hints.
pub type Labels = BTreeMap<String, String>;

// ── Node ──────────────────────────────────────────────────────────

/// Liveness status of a node as judged by the health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Healthy,
    Unhealthy,
}

/// A simulated cluster member with a fixed compute capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Total compute units.
    pub total_capacity: u32,
    /// Compute units not claimed by any hosted pod.
    pub available_capacity: u32,
    /// Pods currently hosted, in attach order.
    pub workload_ids: Vec<WorkloadId>,
    pub status: NodeStatus,
    /// Unix timestamp (seconds) of the last heartbeat.
    pub last_heartbeat: u64,
    /// Driver unit backing this node.
    pub runtime_unit_id: UnitId,
    #[serde(default)]
    pub labels: Labels,
    /// Unix timestamp (seconds) when this node was added.
    pub created_at: u64,
}

impl Node {
    /// Build a fresh, empty, healthy node.
    pub fn new(id: impl Into<NodeId>, capacity: u32, runtime_unit_id: UnitId, now: u64) -> Self {
        Self {
            id: id.into(),
            total_capacity: capacity,
            available_capacity: capacity,
            workload_ids: Vec::new(),
            status: NodeStatus::Healthy,
            last_heartbeat: now,
            runtime_unit_id,
            labels: Labels::new(),
            created_at: now,
        }
    }

    /// Compute units claimed by hosted pods.
    pub fn used_capacity(&self) -> u32 {
        self.total_capacity - self.available_capacity
    }

    pub fn is_healthy(&self) -> bool {
        self.status == NodeStatus::Healthy
    }

    pub fn is_empty(&self) -> bool {
        self.workload_ids.is_empty()
    }
}

// ── Workload ──────────────────────────────────────────────────────

/// Lifecycle status of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadStatus {
    /// Attached to a node with a live backing unit.
    Running,
    /// Detached, waiting for a node with enough capacity.
    Pending,
    /// Relocation failed and there was no node to fall back to.
    Error,
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadStatus::Running => f.write_str("running"),
            WorkloadStatus::Pending => f.write_str("pending"),
            WorkloadStatus::Error => f.write_str("error"),
        }
    }
}

/// A schedulable unit with a fixed resource demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workload {
    pub id: WorkloadId,
    pub cpu_requirement: u32,
    /// Hosting node; `None` while detached.
    pub node_id: Option<NodeId>,
    pub runtime_unit_id: UnitId,
    pub status: WorkloadStatus,
    #[serde(default)]
    pub labels: Labels,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Workload {
    pub fn is_attached(&self) -> bool {
        self.node_id.is_some()
    }
}

// ── Summary ───────────────────────────────────────────────────────

/// Aggregate view of the cluster for dashboards and the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterSummary {
    pub nodes: usize,
    pub healthy_nodes: usize,
    pub total_capacity: u64,
    pub available_capacity: u64,
    pub pods: usize,
    pub running_pods: usize,
    pub pending_pods: usize,
    pub error_pods: usize,
}
