//! Results of operations that tear down backing units.
//!
//! Destroying a unit is best-effort: the bookkeeping change has already
//! been committed by the time the driver is asked, and a failure only means
//! a unit leaked. `Cleanup` records what happened so callers can tell a
//! swallowed driver failure apart from an error that aborted the operation.

use podgrid_state::{Node, NodeId, UnitId, Workload, WorkloadId};
use serde::Serialize;

/// Outcome of a best-effort unit teardown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Cleanup {
    /// The driver destroyed the unit.
    Destroyed,
    /// The unit no longer existed.
    AlreadyGone,
    /// The driver failed; the unit may have leaked.
    Failed { reason: String },
}

impl Cleanup {
    pub fn is_failed(&self) -> bool {
        matches!(self, Cleanup::Failed { .. })
    }
}

/// A pod removed from the cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Removal {
    pub workload: Workload,
    pub cleanup: Cleanup,
}

/// A node removed from the cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRemoval {
    pub node: Node,
    pub cleanup: Cleanup,
}

/// A pod moved to a new node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relocation {
    pub workload: Workload,
    /// Node the pod left, if it was attached.
    pub from: Option<NodeId>,
    pub to: NodeId,
    /// Teardown of the pod's previous unit.
    pub cleanup: Cleanup,
}

/// Units recorded in the state store that the driver no longer knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitAudit {
    pub checked: usize,
    pub missing_node_units: Vec<(NodeId, UnitId)>,
    pub missing_pod_units: Vec<(WorkloadId, UnitId)>,
}

impl UnitAudit {
    pub fn is_clean(&self) -> bool {
        self.missing_node_units.is_empty() && self.missing_pod_units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_serializes_tagged() {
        let failed = Cleanup::Failed {
            reason: "driver down".to_string(),
        };
        assert!(failed.is_failed());
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "result": "failed", "reason": "driver down" })
        );
        assert_eq!(
            serde_json::to_value(Cleanup::AlreadyGone).unwrap(),
            serde_json::json!({ "result": "already_gone" })
        );
    }

    #[test]
    fn empty_audit_is_clean() {
        let mut audit = UnitAudit::default();
        assert!(audit.is_clean());
        audit
            .missing_pod_units
            .push(("pod-1".to_string(), "sim-pod-000001".to_string()));
        assert!(!audit.is_clean());
    }
}
