//! Flows: non-negative decision variables connected to balances via arrows.

use crate::error::{CoreError, CoreResult};
use crate::id::Id;
use crate::objects::{AssembleCtx, AssembleOutcome};
use crate::store::{horizon_of, HorizonStore};
use crate::traits::{Arrow, Capacity, Cost, SimpleSumCost};
use melt_solver::Problem;
use melt_time::ProbTime;

/// A transfer or production variable, one entry per horizon period.
///
/// The horizon is chosen at assemble as the finest of the horizons reached
/// through the flow's arrows, so the flow always refines every balance it
/// touches.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    id: Id,
    arrows: Vec<Arrow>,
    lb: Option<Capacity>,
    ub: Option<Capacity>,
    costs: Vec<Cost>,
    sumcost: SimpleSumCost,
    horizon: Option<Id>,
}

impl Flow {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            arrows: Vec::new(),
            lb: None,
            ub: None,
            costs: Vec::new(),
            sumcost: SimpleSumCost::default(),
            horizon: None,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn lp_var(&self) -> String {
        self.id.lp_name()
    }

    pub fn horizon(&self) -> Option<&Id> {
        self.horizon.as_ref()
    }

    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    pub fn add_arrow(&mut self, arrow: Arrow) {
        self.arrows.push(arrow);
    }

    pub fn arrow_mut(&mut self, id: &Id) -> Option<&mut Arrow> {
        self.arrows.iter_mut().find(|a| a.id() == id)
    }

    pub fn add_cost(&mut self, cost: Cost) {
        self.costs.push(cost);
    }

    pub fn set_capacity(&mut self, capacity: Capacity) {
        if capacity.is_upper {
            self.ub = Some(capacity);
        } else {
            self.lb = Some(capacity);
        }
    }

    pub fn upper_capacity(&self) -> Option<&Capacity> {
        self.ub.as_ref()
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        if self.arrows.is_empty() {
            return Err(CoreError::InvariantViolation(format!(
                "flow {} has no arrows",
                self.id
            )));
        }
        let mut missing = Vec::new();
        for arrow in &mut self.arrows {
            match arrow.resolve_target(ctx)? {
                AssembleOutcome::Done => {}
                AssembleOutcome::Missing(ids) => missing.extend(ids),
            }
        }
        if !missing.is_empty() {
            return Ok(AssembleOutcome::Missing(missing));
        }

        // The finest horizon reached through the arrows wins
        let mut finest: Option<(usize, Id)> = None;
        for arrow in &self.arrows {
            if let Some(hid) = arrow.balance_horizon() {
                let Some(periods) = ctx.horizon_periods(hid) else {
                    return Ok(AssembleOutcome::missing(hid.clone()));
                };
                if finest.as_ref().map(|(n, _)| periods > *n).unwrap_or(true) {
                    finest = Some((periods, hid.clone()));
                }
            }
        }
        let Some((_, hid)) = finest else {
            return Err(CoreError::InvariantViolation(format!(
                "flow {} reaches no endogenous balance",
                self.id
            )));
        };
        self.horizon = Some(hid);

        // Consolidate direct costs with the income/cost terms implied by
        // exogenous targets
        let mut terms = self.costs.clone();
        terms.extend(self.arrows.iter().filter_map(Arrow::exogen_cost));
        self.sumcost = SimpleSumCost::new(terms);
        Ok(AssembleOutcome::Done)
    }

    fn horizon_id(&self) -> CoreResult<&Id> {
        self.horizon.as_ref().ok_or_else(|| {
            CoreError::InvariantViolation(format!("flow {} used before assemble", self.id))
        })
    }

    pub(crate) fn build(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        let hid = self.horizon_id()?;
        let periods = horizon_of(hs, hid)?.num_periods();
        let var = self.lp_var();
        lp.add_var(&var, periods)?;
        for arrow in &self.arrows {
            arrow.build(lp, hs, hid)?;
        }
        Ok(())
    }

    pub(crate) fn set_constants(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        let hid = self.horizon_id()?;
        let horizon = horizon_of(hs, hid)?;
        let var = self.lp_var();
        if !self.sumcost.is_empty() && self.sumcost.is_constant() && !horizon.is_mutable() {
            for ix in 0..horizon.num_periods() {
                let value = self
                    .sumcost
                    .constant_value(&horizon.period_delta(ix))
                    .expect("constant sum cost");
                lp.set_obj_coeff(&var, ix, value)?;
            }
        }
        if let Some(cap) = &self.lb {
            cap.set_constants(lp, &var, horizon)?;
        }
        if let Some(cap) = &self.ub {
            cap.set_constants(lp, &var, horizon)?;
        }
        for arrow in &self.arrows {
            arrow.set_constants(lp, hs, &var, hid)?;
        }
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        t: &ProbTime,
    ) -> CoreResult<()> {
        let hid = self.horizon_id()?.clone();
        let horizon = horizon_of(hs, &hid)?;
        let var = self.lp_var();
        let static_cost = self.sumcost.is_constant() && !horizon.is_mutable();
        if !self.sumcost.is_empty() && !static_cost {
            for ix in 0..horizon.num_periods() {
                if !horizon.must_update(ix) {
                    continue;
                }
                let start = horizon.start_of(ix, t);
                let value = self.sumcost.value(&start, &horizon.period_delta(ix));
                lp.set_obj_coeff(&var, ix, value)?;
            }
        }
        if let Some(cap) = &self.lb {
            cap.update(lp, &var, horizon, t)?;
        }
        if let Some(cap) = &self.ub {
            cap.update(lp, &var, horizon, t)?;
        }
        for arrow in &self.arrows {
            arrow.update(lp, hs, &var, &hid, t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use melt_time::Param;

    #[test]
    fn test_flow_without_arrows_fails_assemble() {
        let mut flow = Flow::new(Id::new("Flow", "Orphan"));
        let objects = std::collections::BTreeMap::new();
        let lowlevel = crate::store::LowLevelStore::default();
        let ctx = AssembleCtx {
            objects: &objects,
            lowlevel: &lowlevel,
        };
        assert!(matches!(
            flow.assemble(&ctx),
            Err(CoreError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_capacity_slots() {
        let mut flow = Flow::new(Id::new("Flow", "Gas"));
        flow.set_capacity(Capacity::new(Param::constant(100.0), true));
        flow.set_capacity(Capacity::new(Param::constant(10.0), false));
        assert!(flow.upper_capacity().is_some());
        assert!(flow.lb.is_some());
    }
}
