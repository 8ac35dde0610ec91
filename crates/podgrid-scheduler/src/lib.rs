//! podgrid-scheduler — the only writer of cluster state.
//!
//! Every operation that changes nodes or pods goes through the
//! `Scheduler`. Multi-step operations follow reserve → provision →
//! commit, or compensate:
//!
//! - capacity is reserved under the state write lock
//! - the runtime driver is called with the lock released
//! - the lock is re-taken to commit the result or undo the reservation
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── StateStore (nodes, pods, reservation ledger)
//!   ├── BoundedDriver → RuntimeDriver (provision / destroy / inspect)
//!   ├── AlgorithmCell (active placement algorithm)
//!   └── KeyedLocks (one async lock per pod id)
//! ```

pub mod error;
pub mod locks;
pub mod outcome;
pub mod scheduler;

pub use error::{ErrorKind, SchedulerError, SchedulerResult};
pub use locks::{KeyGuard, KeyedLocks};
pub use outcome::{Cleanup, NodeRemoval, Relocation, Removal, UnitAudit};
pub use scheduler::{Scheduler, SchedulerConfig};
