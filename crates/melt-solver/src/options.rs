//! Solver options shared by all adapters.
//!
//! Option sets are portable: an adapter applies the knobs its backend has
//! and ignores the rest, so the same options value can drive either adapter.

use serde::{Deserialize, Serialize};

/// Simplex / interior-point tuning observable at the backend boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolveMethod {
    Simplex {
        scale_strategy: i32,
        strategy: i32,
        max_concurrency: usize,
    },
    InteriorPoint {
        scale_strategy: i32,
        crossover: bool,
    },
}

impl Default for SolveMethod {
    fn default() -> Self {
        SolveMethod::InteriorPoint {
            scale_strategy: 0,
            crossover: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Wall-clock limit in seconds; expiry surfaces as a solver failure.
    pub time_limit: f64,
    pub verbose: bool,
    pub method: SolveMethod,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            time_limit: 300.0,
            verbose: false,
            method: SolveMethod::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_time_limit() {
        let opts = SolverOptions::default();
        assert_eq!(opts.time_limit, 300.0);
        assert!(!opts.verbose);
    }
}
