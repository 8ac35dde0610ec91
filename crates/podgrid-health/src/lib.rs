//! podgrid-health — heartbeat-driven failure detection for podgrid.
//!
//! Nodes prove liveness by sending heartbeats. The monitor scans node
//! freshness on a fixed interval; a healthy node whose last heartbeat is
//! older than the timeout is marked unhealthy and every pod it hosts is
//! relocated through the scheduler, one at a time.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   ├── run(shutdown)    periodic task, stopped via watch channel
//!   └── check_at(now)    one deterministic scan → ScanReport
//!         ├── Scheduler::fail_node_if_stale()
//!         └── Scheduler::reschedule_pod() per hosted pod
//! ```
//!
//! A heartbeat restores `healthy` unconditionally; recovered nodes are
//! simply placeable again. Nodes are never deleted by the monitor.

pub mod monitor;
pub mod report;

pub use monitor::{HealthMonitor, MonitorConfig};
pub use report::{PodOutcome, ScanReport};
