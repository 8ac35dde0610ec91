//! Placement engine — picks the node that hosts a pod.
//!
//! Given a demand and the candidate nodes, the placer:
//! 1. Drops unhealthy nodes and nodes that cannot fit the demand
//! 2. Picks one survivor according to the active algorithm
//!
//! Candidates are always in node insertion order, and every algorithm
//! breaks ties by that order, so the same inputs give the same answer.

use podgrid_state::{ClusterState, NodeId, NodeStatus};
use tracing::debug;

use crate::algorithm::PlacementAlgorithm;

/// A node as seen by the placer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub node_id: NodeId,
    pub status: NodeStatus,
    /// Capacity a new placement may claim (available minus in-flight
    /// reservations).
    pub available: u32,
}

impl Candidate {
    fn fits(&self, demand: u32) -> bool {
        self.status == NodeStatus::Healthy && self.available >= demand
    }
}

/// Snapshot the nodes of a cluster state as placement candidates.
pub fn candidates_from_state(state: &ClusterState) -> Vec<Candidate> {
    state
        .nodes()
        .map(|n| Candidate {
            node_id: n.id.clone(),
            status: n.status,
            available: state.schedulable_capacity(&n.id).unwrap_or(0),
        })
        .collect()
}

/// Select a node for `demand` units. `None` means no node qualifies,
/// which is an expected outcome rather than an error.
pub fn select_node(
    demand: u32,
    candidates: &[Candidate],
    algorithm: PlacementAlgorithm,
) -> Option<NodeId> {
    let mut fitting = candidates.iter().filter(|c| c.fits(demand));

    let chosen = match algorithm {
        PlacementAlgorithm::FirstFit => fitting.next(),
        // Strict comparisons keep the earliest node on ties.
        PlacementAlgorithm::BestFit => {
            fitting.reduce(|best, c| if c.available < best.available { c } else { best })
        }
        PlacementAlgorithm::WorstFit => {
            fitting.reduce(|best, c| if c.available > best.available { c } else { best })
        }
    };

    match chosen {
        Some(c) => {
            debug!(node = %c.node_id, demand, available = c.available, %algorithm, "node selected");
            Some(c.node_id.clone())
        }
        None => {
            debug!(demand, %algorithm, candidates = candidates.len(), "no node fits");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_state::Node;

    fn candidate(id: &str, available: u32) -> Candidate {
        Candidate {
            node_id: id.to_string(),
            status: NodeStatus::Healthy,
            available,
        }
    }

    #[test]
    fn first_fit_takes_insertion_order() {
        let nodes = vec![candidate("n4", 4), candidate("n8", 8)];
        assert_eq!(
            select_node(2, &nodes, PlacementAlgorithm::FirstFit).as_deref(),
            Some("n4")
        );
    }

    #[test]
    fn best_fit_takes_tightest_node() {
        let nodes = vec![candidate("a", 8), candidate("b", 3), candidate("c", 5)];
        assert_eq!(
            select_node(3, &nodes, PlacementAlgorithm::BestFit).as_deref(),
            Some("b")
        );
    }

    #[test]
    fn worst_fit_takes_loosest_node() {
        let nodes = vec![candidate("a", 5), candidate("b", 9), candidate("c", 7)];
        assert_eq!(
            select_node(1, &nodes, PlacementAlgorithm::WorstFit).as_deref(),
            Some("b")
        );
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let nodes = vec![candidate("x", 6), candidate("y", 6), candidate("z", 6)];
        for algorithm in PlacementAlgorithm::ALL {
            assert_eq!(select_node(2, &nodes, algorithm).as_deref(), Some("x"));
        }
    }

    #[test]
    fn only_large_enough_node_qualifies() {
        let nodes = vec![candidate("n4", 4), candidate("n8", 8)];
        assert_eq!(
            select_node(6, &nodes, PlacementAlgorithm::BestFit).as_deref(),
            Some("n8")
        );
    }

    #[test]
    fn unhealthy_nodes_are_skipped() {
        let mut sick = candidate("sick", 10);
        sick.status = NodeStatus::Unhealthy;
        let nodes = vec![sick, candidate("ok", 2)];
        assert_eq!(
            select_node(2, &nodes, PlacementAlgorithm::WorstFit).as_deref(),
            Some("ok")
        );
    }

    #[test]
    fn no_candidate_when_demand_exceeds_all() {
        let nodes = vec![candidate("a", 4), candidate("b", 8)];
        for algorithm in PlacementAlgorithm::ALL {
            assert_eq!(select_node(9, &nodes, algorithm), None);
        }
        assert_eq!(select_node(1, &[], PlacementAlgorithm::FirstFit), None);
    }

    #[test]
    fn candidates_account_for_reservations() {
        let mut state = ClusterState::default();
        state
            .insert_node(Node::new("a", 4, "unit-a".to_string(), 1000))
            .unwrap();
        state
            .insert_node(Node::new("b", 8, "unit-b".to_string(), 1000))
            .unwrap();
        state.reserve("pod-1", "b", 7).unwrap();

        let candidates = candidates_from_state(&state);
        assert_eq!(candidates[0].available, 4);
        assert_eq!(candidates[1].available, 1);
        assert_eq!(
            select_node(3, &candidates, PlacementAlgorithm::WorstFit).as_deref(),
            Some("a")
        );
    }
}
