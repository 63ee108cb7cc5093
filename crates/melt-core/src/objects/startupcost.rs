//! Start-up costs: linearised unit-commitment relaxation on a flow.

use crate::error::{CoreError, CoreResult};
use crate::id::Id;
use crate::objects::{AssembleCtx, AssembleOutcome, ModelObject};
use crate::statevar::{StateVariableInfo, VarRef};
use crate::store::{horizon_of, HorizonStore};
use crate::traits::Capacity;
use melt_solver::Problem;
use melt_time::{Param, ProbTime};

/// Adds an online-capacity variable `u` and a startup variable `s` with
///
/// ```text
/// x[t] <= u[t]                      flow runs only on online capacity
/// x[t] >= msl * u[t]                minimum stable load
/// s[t] >= u[t] - u[t-1]             capacity started this period
/// ```
///
/// and charges `start_cost` per unit of started capacity. The online
/// variable carries over, so `u[0]` couples to a fixable ingoing state.
#[derive(Debug, Clone, PartialEq)]
pub struct StartUpCost {
    id: Id,
    flow: Id,
    start_cost: Param,
    min_stable_load: f64,
    flow_var: Option<String>,
    horizon: Option<Id>,
    capacity: Option<Capacity>,
    periods: usize,
}

impl StartUpCost {
    pub fn new(id: Id, flow: Id, start_cost: Param, min_stable_load: f64) -> CoreResult<Self> {
        if !(0.0..=1.0).contains(&min_stable_load) {
            return Err(CoreError::InvariantViolation(format!(
                "start-up cost {id}: minimum stable load {min_stable_load} outside [0, 1]"
            )));
        }
        Ok(Self {
            id,
            flow,
            start_cost,
            min_stable_load,
            flow_var: None,
            horizon: None,
            capacity: None,
            periods: 0,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    fn online_var(&self) -> String {
        format!("{}_online", self.id.lp_name())
    }

    fn online_start_var(&self) -> String {
        format!("{}_online_start", self.id.lp_name())
    }

    fn started_var(&self) -> String {
        format!("{}_started", self.id.lp_name())
    }

    fn cap_row(&self) -> String {
        format!("{}_cap", self.id.lp_name())
    }

    fn msl_row(&self) -> String {
        format!("{}_msl", self.id.lp_name())
    }

    fn start_row(&self) -> String {
        format!("{}_startup", self.id.lp_name())
    }

    pub fn horizon(&self) -> Option<&Id> {
        self.horizon.as_ref()
    }

    pub fn state_variables(&self) -> Vec<StateVariableInfo> {
        if self.periods == 0 {
            return Vec::new();
        }
        vec![StateVariableInfo::new(
            VarRef::new(self.online_start_var(), 0),
            VarRef::new(self.online_var(), self.periods - 1),
        )]
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        let Some(ModelObject::Flow(flow)) = ctx.objects.get(&self.flow) else {
            return Ok(AssembleOutcome::missing(self.flow.clone()));
        };
        let Some(hid) = flow.horizon() else {
            return Ok(AssembleOutcome::missing(self.flow.clone()));
        };
        let Some(capacity) = flow.upper_capacity() else {
            return Err(CoreError::InvariantViolation(format!(
                "start-up cost {} needs flow {} to have an upper capacity",
                self.id, self.flow
            )));
        };
        let Some(periods) = ctx.horizon_periods(hid) else {
            return Ok(AssembleOutcome::missing(hid.clone()));
        };
        self.flow_var = Some(flow.lp_var());
        self.horizon = Some(hid.clone());
        self.capacity = Some(capacity.clone());
        self.periods = periods;
        Ok(AssembleOutcome::Done)
    }

    pub(crate) fn build(&self, lp: &mut dyn Problem, _hs: &HorizonStore) -> CoreResult<()> {
        lp.add_var(&self.online_var(), self.periods)?;
        lp.add_var(&self.started_var(), self.periods)?;
        lp.add_var(&self.online_start_var(), 1)?;
        lp.make_fixable(&self.online_start_var(), 0)?;
        lp.add_le(&self.cap_row(), self.periods)?;
        lp.add_ge(&self.msl_row(), self.periods)?;
        lp.add_ge(&self.start_row(), self.periods)?;
        Ok(())
    }

    pub(crate) fn set_constants(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        let horizon = horizon_of(hs, self.horizon.as_ref().expect("assembled"))?;
        let flow_var = self.flow_var.clone().expect("assembled");
        let online = self.online_var();
        let started = self.started_var();
        for ix in 0..self.periods {
            lp.set_con_coeff(&self.cap_row(), &flow_var, ix, ix, 1.0)?;
            lp.set_con_coeff(&self.cap_row(), &online, ix, ix, -1.0)?;
            lp.set_con_coeff(&self.msl_row(), &flow_var, ix, ix, 1.0)?;
            lp.set_con_coeff(&self.msl_row(), &online, ix, ix, -self.min_stable_load)?;
            lp.set_con_coeff(&self.start_row(), &started, ix, ix, 1.0)?;
            lp.set_con_coeff(&self.start_row(), &online, ix, ix, -1.0)?;
            if ix == 0 {
                lp.set_con_coeff(&self.start_row(), &self.online_start_var(), 0, 0, 1.0)?;
            } else {
                lp.set_con_coeff(&self.start_row(), &online, ix, ix - 1, 1.0)?;
            }
        }
        let capacity = self.capacity.as_ref().expect("assembled");
        capacity.set_constants(lp, &online, horizon)?;
        if capacity.param.is_constant() && !horizon.is_mutable() {
            let value = capacity
                .param
                .constant_value(&horizon.period_delta(0))
                .expect("constant capacity");
            lp.set_ub(&self.online_start_var(), 0, value)?;
        }
        if self.start_cost.is_constant() && !horizon.is_mutable() {
            for ix in 0..self.periods {
                let value = self
                    .start_cost
                    .constant_value(&horizon.period_delta(ix))
                    .expect("constant start cost");
                lp.set_obj_coeff(&started, ix, value)?;
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
        let horizon = horizon_of(hs, self.horizon.as_ref().expect("assembled"))?;
        let online = self.online_var();
        let started = self.started_var();
        let capacity = self.capacity.as_ref().expect("assembled");
        capacity.update(lp, &online, horizon, t)?;
        if !(capacity.param.is_constant() && !horizon.is_mutable()) {
            let value = capacity.period_value(horizon, 0, t);
            lp.set_ub(&self.online_start_var(), 0, value)?;
        }
        if !(self.start_cost.is_constant() && !horizon.is_mutable()) {
            for ix in 0..self.periods {
                if !horizon.must_update(ix) {
                    continue;
                }
                let start = horizon.start_of(ix, t);
                let value = self.start_cost.value(&start, &horizon.period_delta(ix));
                lp.set_obj_coeff(&started, ix, value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_stable_load_validated() {
        let err = StartUpCost::new(
            Id::new("StartUpCost", "Coal"),
            Id::new("Flow", "Coal"),
            Param::constant(1000.0),
            1.4,
        );
        assert!(err.is_err());
    }
}
