//! Boundary conditions on state variables, and the helpers that move state
//! between successive sub-problem solves.

use crate::error::{CoreError, CoreResult};
use crate::id::Id;
use crate::objects::{AssembleCtx, AssembleOutcome};
use crate::statevar::{StateVariableInfo, VarRef};
use crate::store::HorizonStore;
use melt_solver::Problem;
use std::collections::HashMap;

/// Ties every state variable's outgoing half to its ingoing half:
/// `var_out - var_in = 0`. Both an initial and a terminal condition.
#[derive(Debug, Clone, PartialEq)]
pub struct StartEqualStop {
    id: Id,
    target: Id,
    states: Vec<StateVariableInfo>,
}

impl StartEqualStop {
    pub fn new(id: Id, target: Id) -> Self {
        Self {
            id,
            target,
            states: Vec::new(),
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    fn row_name(&self, i: usize) -> String {
        format!("{}_{}", self.id.lp_name(), i)
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        let Some(object) = ctx.objects.get(&self.target) else {
            return Ok(AssembleOutcome::missing(self.target.clone()));
        };
        if !object.is_assembled() {
            return Ok(AssembleOutcome::missing(self.target.clone()));
        }
        self.states = object.state_variables();
        if self.states.is_empty() {
            return Err(CoreError::InvariantViolation(format!(
                "start-equal-stop {} targets {}, which has no state variables",
                self.id, self.target
            )));
        }
        Ok(AssembleOutcome::Done)
    }

    pub(crate) fn build(&self, lp: &mut dyn Problem, _hs: &HorizonStore) -> CoreResult<()> {
        for i in 0..self.states.len() {
            lp.add_eq(&self.row_name(i), 1)?;
        }
        Ok(())
    }

    pub(crate) fn set_constants(&self, lp: &mut dyn Problem, _hs: &HorizonStore) -> CoreResult<()> {
        for (i, state) in self.states.iter().enumerate() {
            let row = self.row_name(i);
            lp.set_con_coeff(&row, &state.var_out.name, 0, state.var_out.ix, 1.0)?;
            lp.set_con_coeff(&row, &state.var_in.name, 0, state.var_in.ix, -1.0)?;
        }
        Ok(())
    }
}

/// Probability-weighted cut parameters for one scenario.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CutParameters {
    pub constant: f64,
    pub slopes: HashMap<VarRef, f64>,
}

/// Benders-style single-cut pool, terminal only.
///
/// One `future_cost` variable enters the objective with coefficient `+1`,
/// and `max_cuts` inequality rows enforce
/// `future_cost >= constant + sum slopes * var_in`. Rows start deactivated
/// (constant `-inf`, slopes `0`); a ring buffer picks the next row to
/// overwrite, wrapping after `max_cuts`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSingleCuts {
    id: Id,
    objects: Vec<Id>,
    probabilities: Vec<f64>,
    max_cuts: usize,
    states: Vec<StateVariableInfo>,
    num_cuts: usize,
    cut_ix: usize,
}

impl SimpleSingleCuts {
    pub fn new(id: Id, objects: Vec<Id>, probabilities: Vec<f64>, max_cuts: usize) -> Self {
        Self {
            id,
            objects,
            probabilities,
            max_cuts,
            states: Vec::new(),
            num_cuts: 0,
            cut_ix: 0,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn future_cost_var(&self) -> String {
        format!("{}_futurecost", self.id.lp_name())
    }

    pub fn cut_rows(&self) -> String {
        format!("{}_cuts", self.id.lp_name())
    }

    pub fn states(&self) -> &[StateVariableInfo] {
        &self.states
    }

    pub fn num_cuts(&self) -> usize {
        self.num_cuts
    }

    pub fn cut_index(&self) -> usize {
        self.cut_ix
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        if self.max_cuts == 0 {
            return Err(CoreError::InvariantViolation(format!(
                "cut pool {} needs at least one cut slot",
                self.id
            )));
        }
        if self.probabilities.iter().any(|p| *p < 0.0) {
            return Err(CoreError::InvariantViolation(format!(
                "cut pool {} has a negative scenario probability",
                self.id
            )));
        }
        let total: f64 = self.probabilities.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return Err(CoreError::InvariantViolation(format!(
                "cut pool {} scenario probabilities sum to {total}, expected 1",
                self.id
            )));
        }
        self.states.clear();
        for id in &self.objects {
            let Some(object) = ctx.objects.get(id) else {
                return Ok(AssembleOutcome::missing(id.clone()));
            };
            if !object.is_assembled() {
                return Ok(AssembleOutcome::missing(id.clone()));
            }
            self.states.extend(object.state_variables());
        }
        if self.states.is_empty() {
            return Err(CoreError::InvariantViolation(format!(
                "cut pool {} covers no state variables",
                self.id
            )));
        }
        Ok(AssembleOutcome::Done)
    }

    pub(crate) fn build(&self, lp: &mut dyn Problem, _hs: &HorizonStore) -> CoreResult<()> {
        lp.add_var(&self.future_cost_var(), 1)?;
        lp.add_ge(&self.cut_rows(), self.max_cuts)?;
        Ok(())
    }

    pub(crate) fn set_constants(&self, lp: &mut dyn Problem, _hs: &HorizonStore) -> CoreResult<()> {
        let fc = self.future_cost_var();
        lp.set_obj_coeff(&fc, 0, 1.0)?;
        lp.set_lb(&fc, 0, f64::NEG_INFINITY)?;
        self.write_deactivated(lp)
    }

    fn write_deactivated(&self, lp: &mut dyn Problem) -> CoreResult<()> {
        let fc = self.future_cost_var();
        let rows = self.cut_rows();
        for row in 0..self.max_cuts {
            lp.set_con_coeff(&rows, &fc, row, 0, 1.0)?;
            for state in &self.states {
                lp.set_con_coeff(&rows, &state.var_in.name, row, state.var_in.ix, 0.0)?;
            }
            lp.set_rhs_term(&rows, "constant", row, f64::NEG_INFINITY)?;
        }
        Ok(())
    }

    /// Write the probability-weighted average of the per-scenario cut
    /// parameters into the current ring slot, then advance the ring.
    pub fn update_cuts(
        &mut self,
        lp: &mut dyn Problem,
        scenarios: &[CutParameters],
    ) -> CoreResult<()> {
        if scenarios.len() != self.probabilities.len() {
            return Err(CoreError::InvariantViolation(format!(
                "cut pool {} got {} scenarios for {} probabilities",
                self.id,
                scenarios.len(),
                self.probabilities.len()
            )));
        }
        let mut constant = 0.0;
        let mut slopes: HashMap<&VarRef, f64> = HashMap::new();
        for state in &self.states {
            slopes.insert(&state.var_in, 0.0);
        }
        for (p, cut) in self.probabilities.iter().zip(scenarios) {
            constant += p * cut.constant;
            for state in &self.states {
                let slope = cut.slopes.get(&state.var_in).copied().unwrap_or(0.0);
                *slopes.get_mut(&state.var_in).expect("seeded") += p * slope;
            }
        }

        let rows = self.cut_rows();
        let row = self.cut_ix;
        lp.set_rhs_term(&rows, "constant", row, constant)?;
        for state in &self.states {
            let slope = slopes[&state.var_in];
            lp.set_con_coeff(&rows, &state.var_in.name, row, state.var_in.ix, -slope)?;
        }
        self.num_cuts = (self.num_cuts + 1).min(self.max_cuts);
        self.cut_ix = (self.cut_ix + 1) % self.max_cuts;
        Ok(())
    }

    /// Deactivate every row and reset the ring.
    pub fn clear_cuts(&mut self, lp: &mut dyn Problem) -> CoreResult<()> {
        self.write_deactivated(lp)?;
        self.num_cuts = 0;
        self.cut_ix = 0;
        Ok(())
    }
}

/// Read the outgoing value of each state variable after a solve.
pub fn get_outgoing_states(
    lp: &dyn Problem,
    states: &[StateVariableInfo],
) -> CoreResult<HashMap<StateVariableInfo, f64>> {
    let mut values = HashMap::with_capacity(states.len());
    for state in states {
        let value = lp.get_var_value(&state.var_out.name, state.var_out.ix)?;
        values.insert(state.clone(), value);
    }
    Ok(values)
}

/// Fix each ingoing state variable to the supplied value.
pub fn set_ingoing_states(
    lp: &mut dyn Problem,
    values: &HashMap<StateVariableInfo, f64>,
) -> CoreResult<()> {
    for (state, value) in values {
        lp.fix(&state.var_in.name, state.var_in.ix, *value)?;
    }
    Ok(())
}

/// Reduce the solved problem into one scenario's cut parameters.
///
/// The slope of each state is the fix-variable dual of its ingoing half;
/// the constant re-anchors the objective at the origin:
/// `constant = objective - sum slopes * x_in`.
pub fn get_cut_parameters(
    lp: &dyn Problem,
    states: &[StateVariableInfo],
    ingoing: &HashMap<StateVariableInfo, f64>,
) -> CoreResult<CutParameters> {
    let mut constant = lp.get_objective_value()?;
    let mut slopes = HashMap::with_capacity(states.len());
    for state in states {
        let slope = lp.get_fix_var_dual(&state.var_in.name, state.var_in.ix)?;
        let x_in = ingoing.get(state).copied().unwrap_or(0.0);
        constant -= slope * x_in;
        slopes.insert(state.var_in.clone(), slope);
    }
    Ok(CutParameters { constant, slopes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use melt_solver::{DirectProblem, Problem};

    fn pool_with_lp(max_cuts: usize) -> (SimpleSingleCuts, DirectProblem) {
        let mut pool = SimpleSingleCuts::new(
            Id::new("BoundaryCondition", "Cuts"),
            vec![Id::new("Storage", "Res")],
            vec![0.5, 0.5],
            max_cuts,
        );
        pool.states = vec![StateVariableInfo::new(
            VarRef::new("Storage.Res_start", 0),
            VarRef::new("Storage.Res", 51),
        )];
        let mut lp = DirectProblem::direct();
        lp.add_var("Storage.Res_start", 1).unwrap();
        lp.add_var("Storage.Res", 52).unwrap();
        pool.build(&mut lp, &Default::default()).unwrap();
        pool.set_constants(&mut lp, &Default::default()).unwrap();
        (pool, lp)
    }

    fn cut(constant: f64, slope: f64) -> CutParameters {
        CutParameters {
            constant,
            slopes: HashMap::from([(VarRef::new("Storage.Res_start", 0), slope)]),
        }
    }

    #[test]
    fn test_rows_start_deactivated() {
        let (pool, lp) = pool_with_lp(3);
        let rows = pool.cut_rows();
        for row in 0..3 {
            assert_eq!(
                lp.get_rhs_term(&rows, "constant", row).unwrap(),
                f64::NEG_INFINITY
            );
            assert_eq!(
                lp.get_con_coeff(&rows, "Storage.Res_start", row, 0).unwrap(),
                0.0
            );
        }
        assert_eq!(lp.get_obj_coeff(&pool.future_cost_var(), 0).unwrap(), 1.0);
    }

    #[test]
    fn test_ring_buffer_wraps_after_max_cuts() {
        let (mut pool, mut lp) = pool_with_lp(3);
        let rows = pool.cut_rows();
        let scenarios = [cut(100.0, -2.0), cut(200.0, -4.0)];

        // Four updates write rows 0, 1, 2, 0
        for step in 0..4 {
            assert_eq!(pool.cut_index(), step % 3);
            pool.update_cuts(&mut lp, &scenarios).unwrap();
        }
        assert_eq!(pool.num_cuts(), 3);
        assert_eq!(pool.cut_index(), 1);

        // Probability-weighted averages: constant 150, slope -3
        for row in 0..3 {
            assert_eq!(lp.get_rhs_term(&rows, "constant", row).unwrap(), 150.0);
            assert_eq!(
                lp.get_con_coeff(&rows, "Storage.Res_start", row, 0).unwrap(),
                3.0
            );
        }
    }

    #[test]
    fn test_clear_cuts_deactivates_everything() {
        let (mut pool, mut lp) = pool_with_lp(3);
        let scenarios = [cut(100.0, -2.0), cut(200.0, -4.0)];
        pool.update_cuts(&mut lp, &scenarios).unwrap();
        pool.clear_cuts(&mut lp).unwrap();
        assert_eq!(pool.num_cuts(), 0);
        assert_eq!(pool.cut_index(), 0);
        let rows = pool.cut_rows();
        for row in 0..3 {
            assert_eq!(
                lp.get_rhs_term(&rows, "constant", row).unwrap(),
                f64::NEG_INFINITY
            );
            assert_eq!(
                lp.get_con_coeff(&rows, "Storage.Res_start", row, 0).unwrap(),
                0.0
            );
        }
    }

    #[test]
    fn test_cut_bounds_future_cost_in_lp() {
        // future_cost >= constant + slope * x_in with x_in fixed
        let (mut pool, mut lp) = pool_with_lp(1);
        lp.make_fixable("Storage.Res_start", 0).unwrap();
        lp.fix("Storage.Res_start", 0, 10.0).unwrap();
        // Keep the rest of the toy LP bounded
        for ix in 0..52 {
            lp.set_ub("Storage.Res", ix, 0.0).unwrap();
        }
        pool.update_cuts(&mut lp, &[cut(100.0, -2.0), cut(100.0, -2.0)])
            .unwrap();
        lp.solve().unwrap();
        // future_cost >= 100 - 2*10 = 80, minimised with +1 objective
        let fc = lp.get_var_value(&pool.future_cost_var(), 0).unwrap();
        assert!((fc - 80.0).abs() < 1e-5);
    }
}
