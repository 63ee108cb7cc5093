//! Price held by exogenous balances.

use melt_time::{Param, ProbTime, TimeDelta};

/// The price of a commodity in an exogenous area.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub param: Param,
}

impl Price {
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
