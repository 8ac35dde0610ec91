//! Placement algorithms and the shared, runtime-switchable selection.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// How a node is chosen among the candidates that fit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementAlgorithm {
    /// First candidate in node insertion order.
    #[default]
    FirstFit,
    /// Candidate with the least available capacity (tightest fit).
    BestFit,
    /// Candidate with the most available capacity (loosest fit).
    WorstFit,
}

impl PlacementAlgorithm {
    pub const ALL: [PlacementAlgorithm; 3] = [
        PlacementAlgorithm::FirstFit,
        PlacementAlgorithm::BestFit,
        PlacementAlgorithm::WorstFit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementAlgorithm::FirstFit => "first-fit",
            PlacementAlgorithm::BestFit => "best-fit",
            PlacementAlgorithm::WorstFit => "worst-fit",
        }
    }
}

impl fmt::Display for PlacementAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown placement algorithm {0:?} (expected first-fit, best-fit, or worst-fit)")]
pub struct ParseAlgorithmError(pub String);

impl FromStr for PlacementAlgorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        PlacementAlgorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| ParseAlgorithmError(s.to_string()))
    }
}

/// Process-wide active algorithm. Cloning shares the same cell.
///
/// Each placement reads the cell once, so a change applies to decisions
/// made after it and never to one already in progress.
#[derive(Debug, Clone, Default)]
pub struct AlgorithmCell {
    inner: Arc<RwLock<PlacementAlgorithm>>,
}

impl AlgorithmCell {
    pub fn new(algorithm: PlacementAlgorithm) -> Self {
        Self {
            inner: Arc::new(RwLock::new(algorithm)),
        }
    }

    pub fn get(&self) -> PlacementAlgorithm {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the active algorithm, returning the previous one.
    pub fn set(&self, algorithm: PlacementAlgorithm) -> PlacementAlgorithm {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, algorithm);
        if previous != algorithm {
            info!(from = %previous, to = %algorithm, "placement algorithm changed");
        }
        previous
    }
}
