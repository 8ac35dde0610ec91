//! Scheduler error types.

use podgrid_driver::DriverError;
use podgrid_state::StateError;
use thiserror::Error;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("pod not found: {0}")]
    WorkloadNotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("no healthy node has {demand} unit(s) of free capacity")]
    NoCapacity { demand: u32 },

    #[error("node {node_id} has {available} unit(s) free, {requested} requested")]
    InsufficientCapacity {
        node_id: String,
        requested: u32,
        available: u32,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("provisioning failed: {0}")]
    ProvisionFailed(#[source] DriverError),
}

/// Coarse classification used by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    NoCapacity,
    InsufficientCapacity,
    InvalidArgument,
    Provision,
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::NodeNotFound(_) | SchedulerError::WorkloadNotFound(_) => {
                ErrorKind::NotFound
            }
            SchedulerError::Conflict(_) => ErrorKind::Conflict,
            SchedulerError::NoCapacity { .. } => ErrorKind::NoCapacity,
            SchedulerError::InsufficientCapacity { .. } => ErrorKind::InsufficientCapacity,
            SchedulerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SchedulerError::ProvisionFailed(_) => ErrorKind::Provision,
        }
    }
}

impl From<StateError> for SchedulerError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NodeNotFound(id) => SchedulerError::NodeNotFound(id),
            StateError::WorkloadNotFound(id) => SchedulerError::WorkloadNotFound(id),
            other @ (StateError::DuplicateNode(_)
            | StateError::DuplicateWorkload(_)
            | StateError::NodeBusy { .. }
            | StateError::NodeReserved(_)) => SchedulerError::Conflict(other.to_string()),
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
