//! Runtime driver error types.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by a runtime driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("provision failed: {0}")]
    Provision(String),

    #[error("destroy failed: {0}")]
    Destroy(String),

    #[error("unit not found: {0}")]
    NotFound(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl DriverError {
    /// True when the unit is already gone. Callers destroying a unit treat
    /// this as success.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound(_))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
