//! Outcome of one health scan.

use podgrid_state::{NodeId, WorkloadId};
use serde::Serialize;

/// What happened to one pod of a failed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PodOutcome {
    Relocated { to: NodeId },
    /// No healthy node had room; the pod waits detached.
    Pending,
    /// The relocation failed for another reason.
    Failed { reason: String },
}

/// Result of a single scan over all nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Nodes examined.
    pub scanned: usize,
    /// Nodes transitioned to unhealthy by this scan.
    pub failed_nodes: Vec<NodeId>,
    /// Per-pod outcomes, in the order the pods were relocated.
    pub pods: Vec<(WorkloadId, PodOutcome)>,
}

impl ScanReport {
    pub fn relocated(&self) -> usize {
        self.count(|o| matches!(o, PodOutcome::Relocated { .. }))
    }

    pub fn pending(&self) -> usize {
        self.count(|o| matches!(o, PodOutcome::Pending))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PodOutcome::Failed { .. }))
    }

    /// True when the scan changed nothing.
    pub fn is_quiet(&self) -> bool {
        self.failed_nodes.is_empty() && self.pods.is_empty()
    }

    fn count(&self, pred: impl Fn(&PodOutcome) -> bool) -> usize {
        self.pods.iter().filter(|(_, o)| pred(o)).count()
    }
}
