//! The runtime driver contract.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::DriverResult;

/// Opaque identifier of a unit created by the driver.
pub type UnitId = String;

/// Labels attached to a unit on creation.
pub type LabelHints = BTreeMap<String, String>;

/// Creates and destroys the execution units backing nodes and pods.
///
/// Every call is a suspension point for the scheduler. Implementations
/// should bound their own latency; the scheduler additionally wraps the
/// driver in a [`BoundedDriver`](crate::BoundedDriver).
#[async_trait]
pub trait RuntimeDriver: Send + Sync {
    /// Provision the unit backing a node.
    async fn provision_node_unit(&self, labels: &LabelHints) -> DriverResult<UnitId>;

    /// Provision the unit backing a pod on `node_id`.
    async fn provision_workload_unit(
        &self,
        node_id: &str,
        labels: &LabelHints,
    ) -> DriverResult<UnitId>;

    /// Destroy a unit. Destroying a unit that no longer exists returns
    /// `DriverError::NotFound`, which callers must not treat as fatal.
    async fn destroy_unit(&self, unit_id: &str) -> DriverResult<()>;

    /// Check that a unit exists.
    async fn inspect_unit(&self, unit_id: &str) -> DriverResult<UnitId>;
}
