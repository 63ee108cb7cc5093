//! Arrows: signed, conversion-weighted edges from a flow into a balance.
//!
//! On an endogenous target the arrow writes row coefficients through the
//! subperiod mapping; on an exogenous target it becomes a cost term on the
//! flow instead. The loss adjustment depends on direction: ingoing arrows
//! deliver `conversion * (1 - loss)`, outgoing arrows draw
//! `conversion / (1 - loss)`.

use crate::error::CoreResult;
use crate::id::Id;
use crate::objects::{AssembleCtx, AssembleOutcome};
use crate::store::{horizon_of, HorizonStore};
use crate::traits::capacity::Capacity;
use crate::traits::conversion::{Conversion, Loss};
use crate::traits::cost::Cost;
use crate::traits::price::Price;
use melt_solver::Problem;
use melt_time::{
    subperiods, InConversionLossParam, OutConversionLossParam, Param, ProbTime, TwoProductParam,
};
use std::ops::Range;

/// What the arrow found at its balance during assemble.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ArrowTarget {
    #[default]
    Unresolved,
    Endogenous {
        horizon: Id,
    },
    Exogenous {
        price: Price,
    },
}

/// Row sign selected by direction; the balance row convention is documented
/// on `Balance`.
fn direction_sign(is_ingoing: bool) -> f64 {
    if is_ingoing {
        -1.0
    } else {
        1.0
    }
}

/// A directed edge carrying one conversion and an optional loss.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseArrow {
    pub id: Id,
    pub balance: Id,
    pub conversion: Conversion,
    pub loss: Option<Loss>,
    pub is_ingoing: bool,
    target: ArrowTarget,
    /// Conversion-with-loss coefficient, composed at assemble.
    coeff: Option<Param>,
}

impl BaseArrow {
    pub fn new(id: Id, balance: Id, conversion: Conversion, is_ingoing: bool) -> Self {
        Self {
            id,
            balance,
            conversion,
            loss: None,
            is_ingoing,
            target: ArrowTarget::Unresolved,
            coeff: None,
        }
    }

    pub fn set_loss(&mut self, loss: Loss) {
        self.loss = Some(loss);
    }

    pub(crate) fn resolve_target(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        let Some(balance) = ctx.balance(&self.balance) else {
            return Ok(AssembleOutcome::missing(self.balance.clone()));
        };
        self.target = if let Some(price) = balance.price() {
            ArrowTarget::Exogenous {
                price: price.clone(),
            }
        } else {
            let Some(horizon) = balance.horizon() else {
                // The balance exists but has not been assembled yet
                return Ok(AssembleOutcome::missing(self.balance.clone()));
            };
            ArrowTarget::Endogenous {
                horizon: horizon.clone(),
            }
        };
        let conversion = Box::new(self.conversion.param.clone());
        let loss = self.loss.as_ref().map(|l| Box::new(l.param.clone()));
        self.coeff = Some(if self.is_ingoing {
            Param::InConversionLoss(InConversionLossParam { conversion, loss })
        } else {
            Param::OutConversionLoss(OutConversionLossParam { conversion, loss })
        });
        Ok(AssembleOutcome::Done)
    }

    pub fn target(&self) -> &ArrowTarget {
        &self.target
    }

    /// Horizon reached through this arrow, if the target is endogenous.
    pub fn balance_horizon(&self) -> Option<&Id> {
        match &self.target {
            ArrowTarget::Endogenous { horizon } => Some(horizon),
            _ => None,
        }
    }

    /// The cost term this arrow implies when the target is exogenous:
    /// income when selling in, cost when drawing out.
    pub fn exogen_cost(&self) -> Option<Cost> {
        match (&self.target, &self.coeff) {
            (ArrowTarget::Exogenous { price }, Some(coeff)) => Some(Cost::new(
                Param::TwoProduct(TwoProductParam {
                    a: Box::new(price.param.clone()),
                    b: Box::new(coeff.clone()),
                }),
                !self.is_ingoing,
            )),
            _ => None,
        }
    }

    fn coeff(&self) -> &Param {
        self.coeff.as_ref().expect("arrow assembled")
    }

    fn write_rows(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_var: &str,
        flow_horizon: &Id,
        t: Option<&ProbTime>,
    ) -> CoreResult<()> {
        let ArrowTarget::Endogenous { horizon: bh_id } = &self.target else {
            return Ok(());
        };
        let coarse = horizon_of(hs, bh_id)?;
        let fine = horizon_of(hs, flow_horizon)?;
        let row_name = self.balance.lp_name();
        let sign = direction_sign(self.is_ingoing);
        for row in 0..coarse.num_periods() {
            let range: Range<usize> = if bh_id == flow_horizon {
                row..row + 1
            } else {
                subperiods(coarse, fine, row)?
            };
            for fix in range {
                let value = match t {
                    None => {
                        let delta = fine.period_delta(fix);
                        self.coeff()
                            .constant_value(&delta)
                            .expect("static arrow coefficient")
                    }
                    Some(t) => {
                        if !coarse.must_update(row) && !fine.must_update(fix) {
                            continue;
                        }
                        let start = fine.start_of(fix, t);
                        self.coeff().value(&start, &fine.period_delta(fix))
                    }
                };
                lp.set_con_coeff(&row_name, flow_var, row, fix, sign * value)?;
            }
        }
        Ok(())
    }

    fn is_static(&self, hs: &HorizonStore, flow_horizon: &Id) -> CoreResult<bool> {
        let ArrowTarget::Endogenous { horizon: bh_id } = &self.target else {
            return Ok(true);
        };
        Ok(self.coeff().is_constant()
            && !horizon_of(hs, bh_id)?.is_mutable()
            && !horizon_of(hs, flow_horizon)?.is_mutable())
    }

    pub fn set_constants(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_var: &str,
        flow_horizon: &Id,
    ) -> CoreResult<()> {
        if self.is_static(hs, flow_horizon)? {
            self.write_rows(lp, hs, flow_var, flow_horizon, None)?;
        }
        Ok(())
    }

    pub fn update(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_var: &str,
        flow_horizon: &Id,
        t: &ProbTime,
    ) -> CoreResult<()> {
        if self.is_static(hs, flow_horizon)? {
            return Ok(());
        }
        self.write_rows(lp, hs, flow_var, flow_horizon, Some(t))
    }
}

/// Piecewise-linear arrow: the flow variable is split into capacity-bounded
/// segments with their own conversions (endogenous target) or unit costs
/// (exogenous target). Models PQ efficiency curves.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedArrow {
    pub id: Id,
    pub balance: Id,
    pub is_ingoing: bool,
    capacities: Vec<Capacity>,
    conversions: Vec<Param>,
    target: ArrowTarget,
}

impl SegmentedArrow {
    pub fn new(
        id: Id,
        balance: Id,
        is_ingoing: bool,
        capacities: Vec<Param>,
        conversions: Vec<Param>,
    ) -> CoreResult<Self> {
        if capacities.len() != conversions.len() || capacities.is_empty() {
            return Err(crate::error::CoreError::InvariantViolation(format!(
                "segmented arrow {id} needs matching, non-empty capacity and conversion lists"
            )));
        }
        Ok(Self {
            id,
            balance,
            is_ingoing,
            capacities: capacities
                .into_iter()
                .map(|p| Capacity::new(p, true))
                .collect(),
            conversions,
            target: ArrowTarget::Unresolved,
        })
    }

    pub fn num_segments(&self) -> usize {
        self.conversions.len()
    }

    fn seg_var(&self, s: usize) -> String {
        format!("{}_seg{}", self.id.lp_name(), s)
    }

    fn link_row(&self) -> String {
        format!("{}_link", self.id.lp_name())
    }

    pub(crate) fn resolve_target(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        let Some(balance) = ctx.balance(&self.balance) else {
            return Ok(AssembleOutcome::missing(self.balance.clone()));
        };
        self.target = if let Some(price) = balance.price() {
            ArrowTarget::Exogenous {
                price: price.clone(),
            }
        } else {
            let Some(horizon) = balance.horizon() else {
                return Ok(AssembleOutcome::missing(self.balance.clone()));
            };
            ArrowTarget::Endogenous {
                horizon: horizon.clone(),
            }
        };
        Ok(AssembleOutcome::Done)
    }

    pub fn target(&self) -> &ArrowTarget {
        &self.target
    }

    pub fn balance_horizon(&self) -> Option<&Id> {
        match &self.target {
            ArrowTarget::Endogenous { horizon } => Some(horizon),
            _ => None,
        }
    }

    pub fn build(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_horizon: &Id,
    ) -> CoreResult<()> {
        let periods = horizon_of(hs, flow_horizon)?.num_periods();
        for s in 0..self.num_segments() {
            lp.add_var(&self.seg_var(s), periods)?;
        }
        lp.add_eq(&self.link_row(), periods)?;
        Ok(())
    }

    pub fn set_constants(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_var: &str,
        flow_horizon: &Id,
    ) -> CoreResult<()> {
        let fine = horizon_of(hs, flow_horizon)?;
        let periods = fine.num_periods();
        // main_var = sum of segments, every period
        let link = self.link_row();
        for ix in 0..periods {
            lp.set_con_coeff(&link, flow_var, ix, ix, 1.0)?;
            for s in 0..self.num_segments() {
                lp.set_con_coeff(&link, &self.seg_var(s), ix, ix, -1.0)?;
            }
        }
        for (s, cap) in self.capacities.iter().enumerate() {
            cap.set_constants(lp, &self.seg_var(s), fine)?;
        }
        self.write_segment_terms(lp, hs, flow_horizon, None)
    }

    pub fn update(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_horizon: &Id,
        t: &ProbTime,
    ) -> CoreResult<()> {
        let fine = horizon_of(hs, flow_horizon)?;
        for (s, cap) in self.capacities.iter().enumerate() {
            cap.update(lp, &self.seg_var(s), fine, t)?;
        }
        self.write_segment_terms(lp, hs, flow_horizon, Some(t))
    }

    /// Balance-row coefficients (endogenous) or objective costs (exogenous)
    /// per segment. With `t == None` only static values are written.
    fn write_segment_terms(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_horizon: &Id,
        t: Option<&ProbTime>,
    ) -> CoreResult<()> {
        let fine = horizon_of(hs, flow_horizon)?;
        let sign = direction_sign(self.is_ingoing);
        match &self.target {
            ArrowTarget::Unresolved => Ok(()),
            ArrowTarget::Endogenous { horizon: bh_id } => {
                let coarse = horizon_of(hs, bh_id)?;
                for (s, conv) in self.conversions.iter().enumerate() {
                    let seg = self.seg_var(s);
                    let static_coeff =
                        conv.is_constant() && !coarse.is_mutable() && !fine.is_mutable();
                    // Static coefficients are written once at set-constants,
                    // the rest on every update
                    if static_coeff != t.is_none() {
                        continue;
                    }
                    for row in 0..coarse.num_periods() {
                        let range = if bh_id == flow_horizon {
                            row..row + 1
                        } else {
                            subperiods(coarse, fine, row)?
                        };
                        for fix in range {
                            let value = match t {
                                None => conv
                                    .constant_value(&fine.period_delta(fix))
                                    .expect("static segment conversion"),
                                Some(t) => {
                                    if !coarse.must_update(row) && !fine.must_update(fix) {
                                        continue;
                                    }
                                    conv.value(&fine.start_of(fix, t), &fine.period_delta(fix))
                                }
                            };
                            lp.set_con_coeff(&self.balance.lp_name(), &seg, row, fix, sign * value)?;
                        }
                    }
                }
                Ok(())
            }
            ArrowTarget::Exogenous { price } => {
                // Unit cost of each segment: price weighted by its conversion
                for (s, conv) in self.conversions.iter().enumerate() {
                    let seg = self.seg_var(s);
                    let cost_sign = if self.is_ingoing { -1.0 } else { 1.0 };
                    let static_cost =
                        conv.is_constant() && price.is_constant() && !fine.is_mutable();
                    if static_cost != t.is_none() {
                        continue;
                    }
                    for ix in 0..fine.num_periods() {
                        let value = match t {
                            None => {
                                let delta = fine.period_delta(ix);
                                price.param.constant_value(&delta).expect("constant price")
                                    * conv.constant_value(&delta).expect("constant conversion")
                            }
                            Some(t) => {
                                if !fine.must_update(ix) {
                                    continue;
                                }
                                let start = fine.start_of(ix, t);
                                let delta = fine.period_delta(ix);
                                price.value(&start, &delta) * conv.value(&start, &delta)
                            }
                        };
                        lp.set_obj_coeff(&seg, ix, cost_sign * value)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// The sealed set of arrow variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Arrow {
    Base(BaseArrow),
    Segmented(SegmentedArrow),
}

impl Arrow {
    pub fn id(&self) -> &Id {
        match self {
            Arrow::Base(a) => &a.id,
            Arrow::Segmented(a) => &a.id,
        }
    }

    pub fn balance_id(&self) -> &Id {
        match self {
            Arrow::Base(a) => &a.balance,
            Arrow::Segmented(a) => &a.balance,
        }
    }

    pub(crate) fn resolve_target(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        match self {
            Arrow::Base(a) => a.resolve_target(ctx),
            Arrow::Segmented(a) => a.resolve_target(ctx),
        }
    }

    pub fn balance_horizon(&self) -> Option<&Id> {
        match self {
            Arrow::Base(a) => a.balance_horizon(),
            Arrow::Segmented(a) => a.balance_horizon(),
        }
    }

    /// Cost term implied by an exogenous target; segmented arrows carry
    /// their costs on the segment variables instead.
    pub fn exogen_cost(&self) -> Option<Cost> {
        match self {
            Arrow::Base(a) => a.exogen_cost(),
            Arrow::Segmented(_) => None,
        }
    }

    pub fn set_loss(&mut self, loss: Loss) -> CoreResult<()> {
        match self {
            Arrow::Base(a) => {
                a.set_loss(loss);
                Ok(())
            }
            Arrow::Segmented(a) => Err(crate::error::CoreError::InvariantViolation(format!(
                "segmented arrow {} cannot carry a loss",
                a.id
            ))),
        }
    }

    pub fn build(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_horizon: &Id,
    ) -> CoreResult<()> {
        match self {
            Arrow::Base(_) => Ok(()),
            Arrow::Segmented(a) => a.build(lp, hs, flow_horizon),
        }
    }

    pub fn set_constants(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_var: &str,
        flow_horizon: &Id,
    ) -> CoreResult<()> {
        match self {
            Arrow::Base(a) => a.set_constants(lp, hs, flow_var, flow_horizon),
            Arrow::Segmented(a) => a.set_constants(lp, hs, flow_var, flow_horizon),
        }
    }

    pub fn update(
        &self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        flow_var: &str,
        flow_horizon: &Id,
        t: &ProbTime,
    ) -> CoreResult<()> {
        match self {
            Arrow::Base(a) => a.update(lp, hs, flow_var, flow_horizon, t),
            Arrow::Segmented(a) => a.update(lp, hs, flow_horizon, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_sign_convention() {
        assert_eq!(direction_sign(true), -1.0);
        assert_eq!(direction_sign(false), 1.0);
    }

    #[test]
    fn test_segmented_arrow_validates_lists() {
        let err = SegmentedArrow::new(
            Id::new("Arrow", "PQ"),
            Id::new("Balance", "Power"),
            true,
            vec![Param::constant(10.0)],
            vec![Param::constant(1.0), Param::constant(0.8)],
        );
        assert!(err.is_err());
    }
}
