//! Conversion and loss factors consumed by arrows and storages.

use melt_time::{Param, ProbTime, TimeDelta};

/// Multiplicative factor between a flow's unit and a balance's unit
/// (e.g. energy equivalent of a water release).
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub param: Param,
}

impl Conversion {
    pub fn new(param: Param) -> Self {
        Self { param }
    }

    pub fn is_constant(&self) -> bool {
        self.param.is_constant()
    }

    pub fn value(&self, t: &ProbTime, delta: &TimeDelta) -> f64 {
        self.param.value(t, delta)
    }
}

/// Fractional loss in `[0, 1)` applied to a transfer or a stored quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct Loss {
    pub param: Param,
}

impl Loss {
    pub fn new(param: Param) -> Self {
        Self { param }
    }

    pub fn is_constant(&self) -> bool {
        self.param.is_constant()
    }

    pub fn value(&self, t: &ProbTime, delta: &TimeDelta) -> f64 {
        self.param.value(t, delta)
    }
}
