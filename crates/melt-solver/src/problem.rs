//! The backend-neutral LP problem contract.
//!
//! Model objects talk to `dyn Problem` only. Named vectors of variables and
//! rows are created once during build; coefficients, bounds and additive RHS
//! terms are rewritten between solves. `solve` performs at most one
//! reset-and-retry before surfacing [`LpError::SolverFailure`].

use crate::error::{LpError, LpResult};
use crate::options::SolverOptions;
use crate::store::{LpStore, RowKind};

/// Operations the model kernel needs from an LP backend.
pub trait Problem {
    fn add_var(&mut self, id: &str, n: usize) -> LpResult<()>;
    fn add_eq(&mut self, id: &str, n: usize) -> LpResult<()>;
    fn add_ge(&mut self, id: &str, n: usize) -> LpResult<()>;
    fn add_le(&mut self, id: &str, n: usize) -> LpResult<()>;

    fn set_con_coeff(
        &mut self,
        con: &str,
        var: &str,
        con_ix: usize,
        var_ix: usize,
        value: f64,
    ) -> LpResult<()>;
    fn get_con_coeff(&self, con: &str, var: &str, con_ix: usize, var_ix: usize) -> LpResult<f64>;

    fn set_obj_coeff(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()>;
    fn get_obj_coeff(&self, var: &str, ix: usize) -> LpResult<f64>;

    fn set_lb(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()>;
    fn set_ub(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()>;
    fn get_lb(&self, var: &str, ix: usize) -> LpResult<f64>;
    fn get_ub(&self, var: &str, ix: usize) -> LpResult<f64>;

    /// RHS is additive across distinct term ids for the same row; writing
    /// the same term id again replaces just that summand.
    fn set_rhs_term(&mut self, con: &str, term: &str, ix: usize, value: f64) -> LpResult<()>;
    fn get_rhs_term(&self, con: &str, term: &str, ix: usize) -> LpResult<f64>;
    fn row_rhs(&self, con: &str, ix: usize) -> LpResult<f64>;

    fn make_fixable(&mut self, var: &str, ix: usize) -> LpResult<()>;
    fn fix(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()>;
    fn unfix(&mut self, var: &str, ix: usize) -> LpResult<()>;

    fn solve(&mut self) -> LpResult<()>;

    fn get_var_value(&self, var: &str, ix: usize) -> LpResult<f64>;
    fn get_con_dual(&self, con: &str, ix: usize) -> LpResult<f64>;
    fn get_fix_var_dual(&self, var: &str, ix: usize) -> LpResult<f64>;
    fn get_objective_value(&self) -> LpResult<f64>;

    fn has_var(&self, id: &str) -> bool;
    fn has_con(&self, id: &str) -> bool;
    fn num_vars(&self, id: &str) -> LpResult<usize>;
    fn num_rows(&self, id: &str) -> LpResult<usize>;
}

/// One backend's way of solving the buffered LP.
pub trait SolveEngine {
    fn name(&self) -> &'static str;
    /// Whether the backend produces constraint and fix-variable duals.
    fn supports_duals(&self) -> bool;
    /// Flatten the store, run the backend once, write values / duals /
    /// objective back into the store.
    fn solve_once(&mut self, store: &mut LpStore, options: &SolverOptions) -> LpResult<()>;
}

/// Buffered problem bound to one solve engine.
pub struct LpProblem<E> {
    store: LpStore,
    engine: E,
    options: SolverOptions,
}

impl<E: SolveEngine> LpProblem<E> {
    pub fn new(engine: E) -> Self {
        Self {
            store: LpStore::new(),
            engine,
            options: SolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    pub fn backend_name(&self) -> &'static str {
        self.engine.name()
    }
}

impl<E: SolveEngine> Problem for LpProblem<E> {
    fn add_var(&mut self, id: &str, n: usize) -> LpResult<()> {
        self.store.add_var(id, n)
    }

    fn add_eq(&mut self, id: &str, n: usize) -> LpResult<()> {
        self.store.add_con(id, RowKind::Eq, n)
    }

    fn add_ge(&mut self, id: &str, n: usize) -> LpResult<()> {
        self.store.add_con(id, RowKind::Ge, n)
    }

    fn add_le(&mut self, id: &str, n: usize) -> LpResult<()> {
        self.store.add_con(id, RowKind::Le, n)
    }

    fn set_con_coeff(
        &mut self,
        con: &str,
        var: &str,
        con_ix: usize,
        var_ix: usize,
        value: f64,
    ) -> LpResult<()> {
        self.store.set_con_coeff(con, var, con_ix, var_ix, value)
    }

    fn get_con_coeff(&self, con: &str, var: &str, con_ix: usize, var_ix: usize) -> LpResult<f64> {
        self.store.get_con_coeff(con, var, con_ix, var_ix)
    }

    fn set_obj_coeff(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        self.store.set_obj_coeff(var, ix, value)
    }

    fn get_obj_coeff(&self, var: &str, ix: usize) -> LpResult<f64> {
        self.store.get_obj_coeff(var, ix)
    }

    fn set_lb(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        self.store.set_lb(var, ix, value)
    }

    fn set_ub(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        self.store.set_ub(var, ix, value)
    }

    fn get_lb(&self, var: &str, ix: usize) -> LpResult<f64> {
        self.store.get_lb(var, ix)
    }

    fn get_ub(&self, var: &str, ix: usize) -> LpResult<f64> {
        self.store.get_ub(var, ix)
    }

    fn set_rhs_term(&mut self, con: &str, term: &str, ix: usize, value: f64) -> LpResult<()> {
        self.store.set_rhs_term(con, term, ix, value)
    }

    fn get_rhs_term(&self, con: &str, term: &str, ix: usize) -> LpResult<f64> {
        self.store.get_rhs_term(con, term, ix)
    }

    fn row_rhs(&self, con: &str, ix: usize) -> LpResult<f64> {
        self.store.row_rhs(con, ix)
    }

    fn make_fixable(&mut self, var: &str, ix: usize) -> LpResult<()> {
        self.store.make_fixable(var, ix)
    }

    fn fix(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        self.store.fix(var, ix, value)
    }

    fn unfix(&mut self, var: &str, ix: usize) -> LpResult<()> {
        self.store.unfix(var, ix)
    }

    fn solve(&mut self) -> LpResult<()> {
        match self.engine.solve_once(&mut self.store, &self.options) {
            Ok(()) => Ok(()),
            Err(LpError::SolverFailure { status }) => {
                tracing::warn!(
                    backend = self.engine.name(),
                    %status,
                    "solve failed, retrying once"
                );
                self.engine.solve_once(&mut self.store, &self.options)
            }
            Err(other) => Err(other),
        }
    }

    fn get_var_value(&self, var: &str, ix: usize) -> LpResult<f64> {
        self.store.get_var_value(var, ix)
    }

    fn get_con_dual(&self, con: &str, ix: usize) -> LpResult<f64> {
        if !self.engine.supports_duals() {
            return Err(LpError::Unsupported(format!(
                "{} does not expose constraint duals",
                self.engine.name()
            )));
        }
        self.store.get_con_dual(con, ix)
    }

    fn get_fix_var_dual(&self, var: &str, ix: usize) -> LpResult<f64> {
        if !self.engine.supports_duals() {
            return Err(LpError::Unsupported(format!(
                "{} does not expose fix-variable duals",
                self.engine.name()
            )));
        }
        self.store.get_fix_var_dual(var, ix)
    }

    fn get_objective_value(&self) -> LpResult<f64> {
        self.store.get_objective_value()
    }

    fn has_var(&self, id: &str) -> bool {
        self.store.has_var(id)
    }

    fn has_con(&self, id: &str) -> bool {
        self.store.has_con(id)
    }

    fn num_vars(&self, id: &str) -> LpResult<usize> {
        self.store.num_vars(id)
    }

    fn num_rows(&self, id: &str) -> LpResult<usize> {
        self.store.num_rows(id)
    }
}
