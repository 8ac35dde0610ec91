//! Error types for the podgrid state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("pod not found: {0}")]
    WorkloadNotFound(String),

    #[error("node already exists: {0}")]
    DuplicateNode(String),

    #[error("pod already exists: {0}")]
    DuplicateWorkload(String),

    #[error("node {node_id} still hosts {workloads} pod(s)")]
    NodeBusy { node_id: String, workloads: usize },

    #[error("node {0} has an in-flight reservation")]
    NodeReserved(String),
}
