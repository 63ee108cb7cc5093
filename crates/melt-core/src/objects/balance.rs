//! Balances: conservation of a commodity across a horizon.
//!
//! An endogenous balance is an equality row per period. The row sign
//! convention, shared with arrows, storages and RHS terms:
//!
//! ```text
//! x[t] - (1-loss)*x[t-1]                    storage carry-over
//!   - sum_in  conv*(1-loss) * flow          ingoing arrows
//!   + sum_out conv/(1-loss) * flow          outgoing arrows
//! = sum_in rhs - sum_out rhs                RHS terms
//! ```
//!
//! An exogenous balance holds a price and no equation; arrows targeting it
//! become cost terms on their flows.

use crate::error::{CoreError, CoreResult};
use crate::id::Id;
use crate::objects::{AssembleCtx, AssembleOutcome};
use crate::store::{horizon_of, HorizonStore};
use crate::traits::{Price, RhsTerm};
use melt_solver::Problem;
use melt_time::{Param, ProbTime};

/// Endogenous balances carry RHS terms; exogenous ones carry a price.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceKind {
    Endogenous { rhs_terms: Vec<RhsTerm> },
    Exogenous { price: Price },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    id: Id,
    commodity: Id,
    kind: BalanceKind,
    horizon: Option<Id>,
}

impl Balance {
    pub fn endogenous(id: Id, commodity: Id) -> Self {
        Self {
            id,
            commodity,
            kind: BalanceKind::Endogenous {
                rhs_terms: Vec::new(),
            },
            horizon: None,
        }
    }

    pub fn exogenous(id: Id, commodity: Id, price: Price) -> Self {
        Self {
            id,
            commodity,
            kind: BalanceKind::Exogenous { price },
            horizon: None,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn commodity(&self) -> &Id {
        &self.commodity
    }

    pub fn is_exogenous(&self) -> bool {
        matches!(self.kind, BalanceKind::Exogenous { .. })
    }

    pub fn price(&self) -> Option<&Price> {
        match &self.kind {
            BalanceKind::Exogenous { price } => Some(price),
            BalanceKind::Endogenous { .. } => None,
        }
    }

    /// Horizon of this balance's commodity, known after assemble.
    pub fn horizon(&self) -> Option<&Id> {
        self.horizon.as_ref()
    }

    pub fn lp_row(&self) -> String {
        self.id.lp_name()
    }

    pub fn rhs_terms(&self) -> &[RhsTerm] {
        match &self.kind {
            BalanceKind::Endogenous { rhs_terms } => rhs_terms,
            BalanceKind::Exogenous { .. } => &[],
        }
    }

    pub fn add_rhs_term(&mut self, term: RhsTerm) -> CoreResult<()> {
        match &mut self.kind {
            BalanceKind::Endogenous { rhs_terms } => {
                rhs_terms.push(term);
                Ok(())
            }
            BalanceKind::Exogenous { .. } => Err(CoreError::InvariantViolation(format!(
                "RHS term {} targets exogenous balance {}",
                term.id, self.id
            ))),
        }
    }

    /// Parameters of RHS terms flagged as residual-load input for adaptive
    /// horizons.
    pub fn residual_params(&self) -> Vec<Param> {
        self.rhs_terms()
            .iter()
            .filter(|term| term.residual_hint)
            .map(|term| term.param.clone())
            .collect()
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        let Some(commodity) = ctx.lowlevel.commodities.get(&self.commodity) else {
            return Ok(AssembleOutcome::missing(self.commodity.clone()));
        };
        if ctx.lowlevel.horizons.get(&commodity.horizon).is_none() {
            return Ok(AssembleOutcome::missing(commodity.horizon.clone()));
        }
        self.horizon = Some(commodity.horizon.clone());
        Ok(AssembleOutcome::Done)
    }

    fn horizon_id(&self) -> CoreResult<&Id> {
        self.horizon.as_ref().ok_or_else(|| {
            CoreError::InvariantViolation(format!("balance {} used before assemble", self.id))
        })
    }

    pub(crate) fn build(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        if self.is_exogenous() {
            return Ok(());
        }
        let horizon = horizon_of(hs, self.horizon_id()?)?;
        lp.add_eq(&self.lp_row(), horizon.num_periods())?;
        Ok(())
    }

    pub(crate) fn set_constants(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        if self.is_exogenous() {
            return Ok(());
        }
        let horizon = horizon_of(hs, self.horizon_id()?)?;
        if horizon.is_mutable() {
            return Ok(());
        }
        let row = self.lp_row();
        for term in self.rhs_terms() {
            if !term.is_constant() {
                continue;
            }
            for ix in 0..horizon.num_periods() {
                let delta = horizon.period_delta(ix);
                let value = term
                    .signed_constant_value(&delta)
                    .expect("constant RHS term");
                lp.set_rhs_term(&row, &term.term_name(), ix, value)?;
            }
        }
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        t: &ProbTime,
    ) -> CoreResult<()> {
        if self.is_exogenous() {
            return Ok(());
        }
        let horizon = horizon_of(hs, self.horizon_id()?)?;
        let row = self.lp_row();
        for term in self.rhs_terms() {
            if term.is_constant() && !horizon.is_mutable() {
                continue;
            }
            for ix in 0..horizon.num_periods() {
                if !horizon.must_update(ix) {
                    continue;
                }
                let start = horizon.start_of(ix, t);
                let value = term.signed_value(&start, &horizon.period_delta(ix));
                lp.set_rhs_term(&row, &term.term_name(), ix, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use melt_time::Param;

    #[test]
    fn test_exogenous_rejects_rhs_terms() {
        let mut balance = Balance::exogenous(
            Id::new("Balance", "GER"),
            Id::new("Commodity", "Power"),
            Price::new(Param::constant(45.0)),
        );
        let term = RhsTerm::new(
            Id::new("RHSTerm", "Demand"),
            Param::constant(100.0),
            false,
        );
        assert!(balance.add_rhs_term(term).is_err());
        assert!(balance.is_exogenous());
        assert!(balance.price().is_some());
    }

    #[test]
    fn test_endogenous_collects_residual_hints() {
        let mut balance =
            Balance::endogenous(Id::new("Balance", "NO2"), Id::new("Commodity", "Power"));
        balance
            .add_rhs_term(
                RhsTerm::new(Id::new("RHSTerm", "Demand"), Param::constant(1.0), false)
                    .with_residual_hint(true),
            )
            .unwrap();
        balance
            .add_rhs_term(RhsTerm::new(
                Id::new("RHSTerm", "Other"),
                Param::constant(2.0),
                true,
            ))
            .unwrap();
        assert_eq!(balance.residual_params().len(), 1);
    }
}
