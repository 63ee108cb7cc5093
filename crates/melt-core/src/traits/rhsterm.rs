//! Signed, durational contributions to a balance equation's RHS.

use crate::id::Id;
use melt_time::{Param, ProbTime, TimeDelta};

/// One RHS term of an endogenous balance (inflow, demand, ...).
///
/// Ingoing terms supply the balance and enter the RHS positively; outgoing
/// terms (demand) enter negatively, matching the row sign convention
/// documented on `Balance`.
#[derive(Debug, Clone, PartialEq)]
pub struct RhsTerm {
    pub id: Id,
    pub param: Param,
    pub is_ingoing: bool,
    /// Include this term in the residual load offered to adaptive horizons.
    pub residual_hint: bool,
}

impl RhsTerm {
    pub fn new(id: Id, param: Param, is_ingoing: bool) -> Self {
        Self {
            id,
            param,
            is_ingoing,
            residual_hint: false,
        }
    }

    pub fn with_residual_hint(mut self, hint: bool) -> Self {
        self.residual_hint = hint;
        self
    }

    pub fn is_constant(&self) -> bool {
        self.param.is_constant()
    }

    pub fn signed_value(&self, t: &ProbTime, delta: &TimeDelta) -> f64 {
        let v = self.param.value(t, delta);
        if self.is_ingoing {
            v
        } else {
            -v
        }
    }

    /// Signed value shared by all problem times, if the parameter has one.
    pub fn signed_constant_value(&self, delta: &TimeDelta) -> Option<f64> {
        let v = self.param.constant_value(delta)?;
        Some(if self.is_ingoing { v } else { -v })
    }

    /// LP term id: RHS contributions are additive per term id.
    pub fn term_name(&self) -> String {
        self.id.lp_name()
    }
}
