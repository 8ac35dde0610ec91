//! podgrid-state — authoritative cluster state for podgrid.
//!
//! Holds the node and pod collections in memory for the lifetime of the
//! process. The node ↔ pod relation and per-node capacity accounting are
//! updated together on every mutation, so for every node
//! `available_capacity + Σ hosted cpu_requirement == total_capacity`
//! whenever no scheduler operation is in flight.
//!
//! # Architecture
//!
//! ```text
//! StateStore (writer, held by the scheduler)
//!   └── Arc<RwLock<ClusterState>>
//!       ├── nodes + insertion order
//!       ├── pods + creation order
//!       └── reservation ledger (in-flight placements, hidden from readers)
//! StateView (read-only, handed to the health monitor and the API)
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{ClusterState, Reservation, StateStore, StateView};
pub use types::*;
