//! podgrid-driver — runtime driver interface for podgrid.
//!
//! The scheduler never creates execution units itself. It calls a
//! [`RuntimeDriver`], which provisions, inspects, and destroys the units
//! backing nodes and pods and hands back opaque unit ids.
//!
//! # Components
//!
//! - **`driver`** — the `RuntimeDriver` trait
//! - **`bounded`** — `BoundedDriver`, a wrapper that caps every call's latency
//! - **`sim`** — `SimDriver`, an in-process driver with failure injection

pub mod bounded;
pub mod driver;
pub mod error;
pub mod sim;

pub use bounded::BoundedDriver;
pub use driver::{LabelHints, RuntimeDriver, UnitId};
pub use error::{DriverError, DriverResult};
pub use sim::{SimDriver, SimUnit, UnitKind};
