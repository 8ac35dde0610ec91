//! podgrid-placement — node selection for new and relocated pods.
//!
//! Placement is a pure function of the demand, the candidate nodes, and
//! the active algorithm. It never mutates state; the scheduler applies
//! the decision.
//!
//! # Components
//!
//! - **`algorithm`** — `PlacementAlgorithm` and the process-wide `AlgorithmCell`
//! - **`placer`** — candidate filtering and selection

pub mod algorithm;
pub mod placer;

pub use algorithm::{AlgorithmCell, ParseAlgorithmError, PlacementAlgorithm};
pub use placer::{Candidate, candidates_from_state, select_node};
