//! Latency cap for driver calls.
//!
//! A driver call that never returns would otherwise stall the operation
//! that issued it forever. `BoundedDriver` turns an expired call into
//! `DriverError::Timeout`, which the scheduler handles exactly like an
//! explicit driver failure.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::driver::{LabelHints, RuntimeDriver, UnitId};
use crate::error::{DriverError, DriverResult};

/// Wraps a driver and bounds every call by `timeout`.
#[derive(Clone)]
pub struct BoundedDriver {
    inner: Arc<dyn RuntimeDriver>,
    timeout: Duration,
}

impl BoundedDriver {
    pub fn new(inner: Arc<dyn RuntimeDriver>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = DriverResult<T>>,
    ) -> DriverResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?self.timeout, "driver call timed out");
                Err(DriverError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl RuntimeDriver for BoundedDriver {
    async fn provision_node_unit(&self, labels: &LabelHints) -> DriverResult<UnitId> {
        self.bounded("provision_node_unit", self.inner.provision_node_unit(labels))
            .await
    }

    async fn provision_workload_unit(
        &self,
        node_id: &str,
        labels: &LabelHints,
    ) -> DriverResult<UnitId> {
        self.bounded(
            "provision_workload_unit",
            self.inner.provision_workload_unit(node_id, labels),
        )
        .await
    }

    async fn destroy_unit(&self, unit_id: &str) -> DriverResult<()> {
        self.bounded("destroy_unit", self.inner.destroy_unit(unit_id))
            .await
    }

    async fn inspect_unit(&self, unit_id: &str) -> DriverResult<UnitId> {
        self.bounded("inspect_unit", self.inner.inspect_unit(unit_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDriver;

    #[tokio::test]
    async fn fast_calls_pass_through() {
        let sim = Arc::new(SimDriver::new());
        let driver = BoundedDriver::new(sim.clone(), Duration::from_secs(1));

        let unit = driver.provision_node_unit(&LabelHints::new()).await.unwrap();
        assert_eq!(driver.inspect_unit(&unit).await.unwrap(), unit);
        driver.destroy_unit(&unit).await.unwrap();
        assert_eq!(sim.unit_count(), 0);
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let sim = Arc::new(SimDriver::new().with_latency(Duration::from_secs(5)));
        let driver = BoundedDriver::new(sim, Duration::from_millis(20));

        let err = driver
            .provision_workload_unit("node-1", &LabelHints::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DriverError::Timeout {
                operation: "provision_workload_unit",
                after: Duration::from_millis(20),
            }
        );
    }

    #[tokio::test]
    async fn driver_errors_are_not_rewritten() {
        let sim = Arc::new(SimDriver::new());
        sim.fail_next_provisions(1);
        let driver = BoundedDriver::new(sim, Duration::from_secs(1));

        let err = driver.provision_node_unit(&LabelHints::new()).await.unwrap_err();
        assert!(matches!(err, DriverError::Provision(_)));
    }
}
