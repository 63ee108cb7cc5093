//! Modelling-layer adapter: rebuilds a good_lp model from the buffered LP on
//! every solve.
//!
//! good_lp gives solver portability (Clarabel today, HiGHS or CBC by feature
//! flag) at the price of no dual access, so this adapter answers value and
//! objective queries only. Cut generation runs on the direct adapter.

use crate::error::{LpError, LpResult};
use crate::options::SolverOptions;
use crate::problem::SolveEngine;
use crate::store::{row_rhs_sum, LpStore, RowKind};
use good_lp::solvers::clarabel::clarabel;
use good_lp::{constraint, variable, variables, Expression, Solution, SolverModel, Variable};

/// Solve engine backed by the good_lp modelling layer.
#[derive(Debug, Clone, Default)]
pub struct ModelledEngine;

/// Convenience alias for a problem on the modelling-layer adapter.
pub type ModelledProblem = crate::problem::LpProblem<ModelledEngine>;

impl ModelledProblem {
    pub fn modelled() -> Self {
        Self::new(ModelledEngine)
    }
}

impl SolveEngine for ModelledEngine {
    fn name(&self) -> &'static str {
        "good_lp-clarabel"
    }

    fn supports_duals(&self) -> bool {
        false
    }

    fn solve_once(&mut self, store: &mut LpStore, _options: &SolverOptions) -> LpResult<()> {
        if store.num_cols() == 0 {
            store.objective = 0.0;
            store.solved = true;
            return Ok(());
        }

        let mut vars = variables!();
        let mut handles: Vec<Vec<Variable>> = Vec::with_capacity(store.vars.len());
        for block in &store.vars {
            let mut block_handles = Vec::with_capacity(block.n);
            for ix in 0..block.n {
                let (lo, hi) = match block.fixed[ix] {
                    Some(v) => (v, v),
                    None => (block.lb[ix], block.ub[ix]),
                };
                let mut def = variable();
                if lo.is_finite() {
                    def = def.min(lo);
                }
                if hi.is_finite() {
                    def = def.max(hi);
                }
                block_handles.push(vars.add(def));
            }
            handles.push(block_handles);
        }

        let mut objective = Expression::from(0.0);
        for (vb, block) in store.vars.iter().enumerate() {
            for ix in 0..block.n {
                if block.obj[ix] != 0.0 {
                    objective += block.obj[ix] * handles[vb][ix];
                }
            }
        }

        let mut model = vars.minimise(objective).using(clarabel);
        for block in &store.cons {
            for ix in 0..block.n {
                if block.coeffs[ix].is_empty() {
                    continue;
                }
                let b = row_rhs_sum(&block.rhs[ix]);
                // Rows pushed to an infinite nonbinding RHS are deactivated
                match block.kind {
                    RowKind::Ge if b == f64::NEG_INFINITY => continue,
                    RowKind::Le if b == f64::INFINITY => continue,
                    _ => {}
                }
                let mut expr = Expression::from(0.0);
                for (&(vb, vix), &coeff) in &block.coeffs[ix] {
                    expr += coeff * handles[vb][vix];
                }
                model = match block.kind {
                    RowKind::Eq => model.with(constraint!(expr == b)),
                    RowKind::Ge => model.with(constraint!(expr >= b)),
                    RowKind::Le => model.with(constraint!(expr <= b)),
                };
            }
        }

        let solution = model.solve().map_err(|e| LpError::SolverFailure {
            status: format!("{e:?}"),
        })?;

        let mut objective_value = 0.0;
        for (vb, block) in store.vars.iter_mut().enumerate() {
            for ix in 0..block.n {
                let v = solution.value(handles[vb][ix]);
                block.values[ix] = v;
                objective_value += block.obj[ix] * v;
                block.fix_duals[ix] = 0.0;
            }
        }
        for block in store.cons.iter_mut() {
            block.duals.iter_mut().for_each(|d| *d = 0.0);
            block.rhs_dirty = false;
        }
        store.objective = objective_value;
        store.solved = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Problem;

    #[test]
    fn test_modelled_matches_direct_objective() {
        // min 2x + 3y  s.t.  x + y = 10, x <= 6
        let mut p = ModelledProblem::modelled();
        p.add_var("x", 1).unwrap();
        p.add_var("y", 1).unwrap();
        p.add_eq("balance", 1).unwrap();
        p.set_con_coeff("balance", "x", 0, 0, 1.0).unwrap();
        p.set_con_coeff("balance", "y", 0, 0, 1.0).unwrap();
        p.set_rhs_term("balance", "demand", 0, 10.0).unwrap();
        p.set_obj_coeff("x", 0, 2.0).unwrap();
        p.set_obj_coeff("y", 0, 3.0).unwrap();
        p.set_ub("x", 0, 6.0).unwrap();
        p.solve().unwrap();
        assert!((p.get_objective_value().unwrap() - 24.0).abs() < 1e-6);
        assert!((p.get_var_value("x", 0).unwrap() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_duals_unsupported() {
        let mut p = ModelledProblem::modelled();
        p.add_var("x", 1).unwrap();
        p.add_eq("pin", 1).unwrap();
        p.set_con_coeff("pin", "x", 0, 0, 1.0).unwrap();
        p.set_rhs_term("pin", "value", 0, 1.0).unwrap();
        p.solve().unwrap();
        assert!(matches!(
            p.get_con_dual("pin", 0),
            Err(LpError::Unsupported(_))
        ));
    }

    #[test]
    fn test_fixed_variable_pins_value() {
        let mut p = ModelledProblem::modelled();
        p.add_var("x", 2).unwrap();
        p.add_eq("sum", 1).unwrap();
        p.set_con_coeff("sum", "x", 0, 0, 1.0).unwrap();
        p.set_con_coeff("sum", "x", 0, 1, 1.0).unwrap();
        p.set_rhs_term("sum", "total", 0, 5.0).unwrap();
        p.set_obj_coeff("x", 0, 1.0).unwrap();
        p.make_fixable("x", 0).unwrap();
        p.fix("x", 0, 4.0).unwrap();
        p.solve().unwrap();
        assert!((p.get_var_value("x", 0).unwrap() - 4.0).abs() < 1e-6);
        assert!((p.get_var_value("x", 1).unwrap() - 1.0).abs() < 1e-6);
    }
}
