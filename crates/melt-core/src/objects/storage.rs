//! Storages: end-of-period level of one endogenous balance.

use crate::error::{CoreError, CoreResult};
use crate::id::Id;
use crate::objects::{AssembleCtx, AssembleOutcome};
use crate::statevar::{StateVariableInfo, VarRef};
use crate::store::{horizon_of, HorizonStore};
use crate::traits::{Capacity, Cost, Loss, SimpleSumCost};
use melt_solver::Problem;
use melt_time::ProbTime;

/// Level variable per period plus a dedicated, fixable `x[0]` start
/// variable. Writes the carry-over coefficients into its balance rows:
/// `+1` at period `t` and `-(1-loss)` coupling `x[t-1]` into `t`.
#[derive(Debug, Clone, PartialEq)]
pub struct Storage {
    id: Id,
    balance: Id,
    lb: Option<Capacity>,
    ub: Option<Capacity>,
    loss: Option<Loss>,
    costs: Vec<Cost>,
    sumcost: SimpleSumCost,
    horizon: Option<Id>,
    periods: usize,
}

impl Storage {
    pub fn new(id: Id, balance: Id) -> Self {
        Self {
            id,
            balance,
            lb: None,
            ub: None,
            loss: None,
            costs: Vec::new(),
            sumcost: SimpleSumCost::default(),
            horizon: None,
            periods: 0,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn balance_id(&self) -> &Id {
        &self.balance
    }

    pub fn lp_var(&self) -> String {
        self.id.lp_name()
    }

    pub fn start_var(&self) -> String {
        format!("{}_start", self.id.lp_name())
    }

    pub fn horizon(&self) -> Option<&Id> {
        self.horizon.as_ref()
    }

    pub fn set_capacity(&mut self, capacity: Capacity) {
        if capacity.is_upper {
            self.ub = Some(capacity);
        } else {
            self.lb = Some(capacity);
        }
    }

    pub fn set_loss(&mut self, loss: Loss) {
        self.loss = Some(loss);
    }

    pub fn add_cost(&mut self, cost: Cost) {
        self.costs.push(cost);
    }

    /// The storage's single carry-over pair, available after assemble.
    pub fn state_variables(&self) -> Vec<StateVariableInfo> {
        if self.periods == 0 {
            return Vec::new();
        }
        vec![StateVariableInfo::new(
            VarRef::new(self.start_var(), 0),
            VarRef::new(self.lp_var(), self.periods - 1),
        )]
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        let Some(balance) = ctx.balance(&self.balance) else {
            return Ok(AssembleOutcome::missing(self.balance.clone()));
        };
        if balance.is_exogenous() {
            return Err(CoreError::InvariantViolation(format!(
                "storage {} sits on exogenous balance {}",
                self.id, self.balance
            )));
        }
        let Some(hid) = balance.horizon() else {
            return Ok(AssembleOutcome::missing(self.balance.clone()));
        };
        let Some(periods) = ctx.horizon_periods(hid) else {
            return Ok(AssembleOutcome::missing(hid.clone()));
        };
        if periods < 2 {
            return Err(CoreError::InvariantViolation(format!(
                "storage {} needs a horizon with at least two periods, got {periods}",
                self.id
            )));
        }
        if self.ub.is_none() {
            return Err(CoreError::InvariantViolation(format!(
                "storage {} has no upper capacity",
                self.id
            )));
        }
        self.horizon = Some(hid.clone());
        self.periods = periods;
        self.sumcost = SimpleSumCost::new(self.costs.clone());
        Ok(AssembleOutcome::Done)
    }

    fn horizon_id(&self) -> CoreResult<&Id> {
        self.horizon.as_ref().ok_or_else(|| {
            CoreError::InvariantViolation(format!("storage {} used before assemble", self.id))
        })
    }

    /// Carry-over factor `-(1-loss)` for one period, if it is static.
    fn static_coupling(&self, horizon: &melt_time::Horizon) -> Option<f64> {
        if horizon.is_mutable() {
            return None;
        }
        match &self.loss {
            None => Some(-1.0),
            Some(loss) => {
                let delta = horizon.period_delta(0);
                loss.param.constant_value(&delta).map(|l| -(1.0 - l))
            }
        }
    }

    fn write_coupling(
        &self,
        lp: &mut dyn Problem,
        horizon: &melt_time::Horizon,
        t: Option<&ProbTime>,
    ) -> CoreResult<()> {
        let row = self.balance.lp_name();
        let var = self.lp_var();
        let start = self.start_var();
        for ix in 0..self.periods {
            if t.is_some() && !horizon.must_update(ix) {
                continue;
            }
            let factor = match t {
                None => self.static_coupling(horizon).expect("static coupling"),
                Some(t) => {
                    let begin = horizon.start_of(ix, t);
                    let delta = horizon.period_delta(ix);
                    match &self.loss {
                        None => -1.0,
                        Some(loss) => -(1.0 - loss.value(&begin, &delta)),
                    }
                }
            };
            if ix == 0 {
                lp.set_con_coeff(&row, &start, 0, 0, factor)?;
            } else {
                lp.set_con_coeff(&row, &var, ix, ix - 1, factor)?;
            }
        }
        Ok(())
    }

    pub(crate) fn build(&self, lp: &mut dyn Problem, _hs: &HorizonStore) -> CoreResult<()> {
        lp.add_var(&self.lp_var(), self.periods)?;
        lp.add_var(&self.start_var(), 1)?;
        lp.make_fixable(&self.start_var(), 0)?;
        Ok(())
    }

    pub(crate) fn set_constants(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        let horizon = horizon_of(hs, self.horizon_id()?)?;
        let row = self.balance.lp_name();
        let var = self.lp_var();

        // The storage's own level coefficient is always +1
        for ix in 0..self.periods {
            lp.set_con_coeff(&row, &var, ix, ix, 1.0)?;
        }
        if self.static_coupling(horizon).is_some() {
            self.write_coupling(lp, horizon, None)?;
        }

        if let Some(cap) = &self.lb {
            cap.set_constants(lp, &var, horizon)?;
        }
        if let Some(cap) = &self.ub {
            cap.set_constants(lp, &var, horizon)?;
            // An unbounded start would let the LP invent stored volume
            if cap.param.is_constant() && !horizon.is_mutable() {
                let value = cap
                    .param
                    .constant_value(&horizon.period_delta(0))
                    .expect("constant upper capacity");
                lp.set_ub(&self.start_var(), 0, value)?;
            }
        }
        if !self.sumcost.is_empty() && self.sumcost.is_constant() && !horizon.is_mutable() {
            for ix in 0..self.periods {
                let value = self
                    .sumcost
                    .constant_value(&horizon.period_delta(ix))
                    .expect("constant sum cost");
                lp.set_obj_coeff(&var, ix, value)?;
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
        let horizon = horizon_of(hs, self.horizon_id()?)?;
        let var = self.lp_var();

        if self.static_coupling(horizon).is_none() {
            self.write_coupling(lp, horizon, Some(t))?;
            // The level coefficient is structural, but mutable horizons may
            // renumber periods
            if horizon.is_mutable() {
                let row = self.balance.lp_name();
                for ix in 0..self.periods {
                    if horizon.must_update(ix) {
                        lp.set_con_coeff(&row, &var, ix, ix, 1.0)?;
                    }
                }
            }
        }
        if let Some(cap) = &self.lb {
            cap.update(lp, &var, horizon, t)?;
        }
        if let Some(cap) = &self.ub {
            cap.update(lp, &var, horizon, t)?;
            if !(cap.param.is_constant() && !horizon.is_mutable()) {
                let value = cap.period_value(horizon, 0, t);
                lp.set_ub(&self.start_var(), 0, value)?;
            }
        }
        let static_cost = self.sumcost.is_constant() && !horizon.is_mutable();
        if !self.sumcost.is_empty() && !static_cost {
            for ix in 0..self.periods {
                if !horizon.must_update(ix) {
                    continue;
                }
                let start = horizon.start_of(ix, t);
                let value = self.sumcost.value(&start, &horizon.period_delta(ix));
                lp.set_obj_coeff(&var, ix, value)?;
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
    fn test_state_variables_need_assemble() {
        let storage = Storage::new(Id::new("Storage", "Res"), Id::new("Balance", "Hydro"));
        assert!(storage.state_variables().is_empty());
    }

    #[test]
    fn test_state_variable_shape() {
        let mut storage = Storage::new(Id::new("Storage", "Res"), Id::new("Balance", "Hydro"));
        storage.periods = 52;
        storage.set_capacity(Capacity::new(Param::constant(16000.0), true));
        let states = storage.state_variables();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].var_in, VarRef::new("Storage.Res_start", 0));
        assert_eq!(states[0].var_out, VarRef::new("Storage.Res", 51));
    }
}
