//! # melt-solver: Backend-Neutral LP Problem Contract
//!
//! Model objects write variables, rows, coefficients, bounds and additive
//! RHS terms through the [`Problem`] trait; a solve engine flattens the
//! buffered LP into its backend's form at solve time.
//!
//! Two adapters are provided:
//!
//! - [`DirectProblem`] hands the matrices straight to Clarabel and exposes
//!   constraint and fix-variable duals.
//! - [`ModelledProblem`] goes through the good_lp modelling layer, which
//!   trades dual access for solver portability.
//!
//! Both adapters share the same buffered [`store::LpStore`], so coefficient
//! reads, RHS-term bookkeeping and fixable-variable state behave identically
//! regardless of backend; only `solve` differs. `solve` retries once on a
//! non-optimal termination before surfacing [`LpError::SolverFailure`].

pub mod direct;
pub mod error;
pub mod modelled;
pub mod options;
pub mod problem;
pub mod store;

pub use direct::{DirectEngine, DirectProblem};
pub use error::{LpError, LpResult};
pub use modelled::{ModelledEngine, ModelledProblem};
pub use options::{SolveMethod, SolverOptions};
pub use problem::{LpProblem, Problem, SolveEngine};
