//! Soft bounds: penalised breach of a cap on a flow or storage variable.

use crate::error::{CoreError, CoreResult};
use crate::id::Id;
use crate::objects::{AssembleCtx, AssembleOutcome, ModelObject};
use crate::store::{horizon_of, HorizonStore};
use melt_solver::Problem;
use melt_time::{Param, ProbTime};

/// Replaces a hard cap with `x - breach <= cap` (upper) or
/// `x + breach >= cap` (lower), charging `penalty` per unit of breach.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftBound {
    id: Id,
    target: Id,
    is_upper: bool,
    soft_cap: Param,
    penalty: Param,
    target_var: Option<String>,
    horizon: Option<Id>,
    periods: usize,
}

impl SoftBound {
    pub fn new(id: Id, target: Id, is_upper: bool, soft_cap: Param, penalty: Param) -> Self {
        Self {
            id,
            target,
            is_upper,
            soft_cap,
            penalty,
            target_var: None,
            horizon: None,
            periods: 0,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    fn breach_var(&self) -> String {
        format!("{}_breach", self.id.lp_name())
    }

    fn bound_row(&self) -> String {
        format!("{}_bound", self.id.lp_name())
    }

    pub fn horizon(&self) -> Option<&Id> {
        self.horizon.as_ref()
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        let Some(object) = ctx.objects.get(&self.target) else {
            return Ok(AssembleOutcome::missing(self.target.clone()));
        };
        let (var, horizon) = match object {
            ModelObject::Flow(flow) => (flow.lp_var(), flow.horizon()),
            ModelObject::Storage(storage) => (storage.lp_var(), storage.horizon()),
            _ => {
                return Err(CoreError::InvariantViolation(format!(
                    "soft bound {} targets {}, which has no variable vector",
                    self.id, self.target
                )))
            }
        };
        let Some(hid) = horizon else {
            return Ok(AssembleOutcome::missing(self.target.clone()));
        };
        let Some(periods) = ctx.horizon_periods(hid) else {
            return Ok(AssembleOutcome::missing(hid.clone()));
        };
        self.target_var = Some(var);
        self.horizon = Some(hid.clone());
        self.periods = periods;
        Ok(AssembleOutcome::Done)
    }

    fn target_var(&self) -> CoreResult<&str> {
        self.target_var.as_deref().ok_or_else(|| {
            CoreError::InvariantViolation(format!("soft bound {} used before assemble", self.id))
        })
    }

    pub(crate) fn build(&self, lp: &mut dyn Problem, _hs: &HorizonStore) -> CoreResult<()> {
        lp.add_var(&self.breach_var(), self.periods)?;
        if self.is_upper {
            lp.add_le(&self.bound_row(), self.periods)?;
        } else {
            lp.add_ge(&self.bound_row(), self.periods)?;
        }
        Ok(())
    }

    pub(crate) fn set_constants(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        let horizon = horizon_of(hs, self.horizon.as_ref().expect("assembled"))?;
        let row = self.bound_row();
        let breach = self.breach_var();
        let target = self.target_var()?.to_string();
        let breach_sign = if self.is_upper { -1.0 } else { 1.0 };
        for ix in 0..self.periods {
            lp.set_con_coeff(&row, &target, ix, ix, 1.0)?;
            lp.set_con_coeff(&row, &breach, ix, ix, breach_sign)?;
        }
        if !horizon.is_mutable() {
            for (param, write_obj) in [(&self.soft_cap, false), (&self.penalty, true)] {
                if !param.is_constant() {
                    continue;
                }
                for ix in 0..self.periods {
                    let value = param
                        .constant_value(&horizon.period_delta(ix))
                        .expect("constant parameter");
                    if write_obj {
                        lp.set_obj_coeff(&breach, ix, value)?;
                    } else {
                        lp.set_rhs_term(&row, "softcap", ix, value)?;
                    }
                }
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
        let row = self.bound_row();
        let breach = self.breach_var();
        for (param, write_obj) in [(&self.soft_cap, false), (&self.penalty, true)] {
            if param.is_constant() && !horizon.is_mutable() {
                continue;
            }
            for ix in 0..self.periods {
                if !horizon.must_update(ix) {
                    continue;
                }
                let start = horizon.start_of(ix, t);
                let value = param.value(&start, &horizon.period_delta(ix));
                if write_obj {
                    lp.set_obj_coeff(&breach, ix, value)?;
                } else {
                    lp.set_rhs_term(&row, "softcap", ix, value)?;
                }
            }
        }
        Ok(())
    }
}
