//! Direct native adapter: hands the buffered LP straight to Clarabel.
//!
//! Clarabel solves `min (1/2)x'Px + q'x  s.t.  Ax + s = b, s in K` with an
//! interior-point method. The flattening maps equality rows and fixed
//! variables onto the zero cone and everything else (inequality rows and
//! finite bounds) onto the nonnegative cone. This adapter produces duals,
//! which the cut machinery needs.

use crate::error::{LpError, LpResult};
use crate::options::SolverOptions;
use crate::problem::SolveEngine;
use crate::store::{row_rhs_sum, LpStore, RowKind};
use clarabel::algebra::CscMatrix;
use clarabel::solver::{DefaultSettingsBuilder, IPSolver, SupportedConeT};

/// Solve engine backed by the Clarabel conic solver.
#[derive(Debug, Clone, Default)]
pub struct DirectEngine;

/// Convenience alias for a problem on the direct adapter.
pub type DirectProblem = crate::problem::LpProblem<DirectEngine>;

impl DirectProblem {
    pub fn direct() -> Self {
        Self::new(DirectEngine)
    }
}

impl SolveEngine for DirectEngine {
    fn name(&self) -> &'static str {
        "clarabel-direct"
    }

    fn supports_duals(&self) -> bool {
        true
    }

    fn solve_once(&mut self, store: &mut LpStore, options: &SolverOptions) -> LpResult<()> {
        let n_cols = store.num_cols();
        if n_cols == 0 {
            store.objective = 0.0;
            store.solved = true;
            return Ok(());
        }
        let offsets = store.col_offsets();

        // Column-wise accumulation of A, then CSC conversion
        let mut cols: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_cols];
        let mut rhs: Vec<f64> = Vec::new();
        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();

        let push_row = |coeffs: &[(usize, f64)],
                            b: f64,
                            eq: bool,
                            cols: &mut Vec<Vec<(usize, f64)>>,
                            rhs: &mut Vec<f64>,
                            cones: &mut Vec<SupportedConeT<f64>>|
         -> usize {
            let row = rhs.len();
            for &(col, val) in coeffs {
                cols[col].push((row, val));
            }
            rhs.push(b);
            // Merge consecutive rows of the same cone kind
            match (eq, cones.last_mut()) {
                (true, Some(SupportedConeT::ZeroConeT(n))) => *n += 1,
                (true, _) => cones.push(SupportedConeT::ZeroConeT(1)),
                (false, Some(SupportedConeT::NonnegativeConeT(n))) => *n += 1,
                (false, _) => cones.push(SupportedConeT::NonnegativeConeT(1)),
            }
            row
        };

        // Equality section: constraint rows, then fixed variables
        let mut con_rows: Vec<Vec<Option<usize>>> = Vec::with_capacity(store.cons.len());
        for block in &store.cons {
            let mut rows = vec![None; block.n];
            if block.kind == RowKind::Eq {
                for ix in 0..block.n {
                    let coeffs: Vec<(usize, f64)> = block.coeffs[ix]
                        .iter()
                        .map(|(&(vb, vix), &v)| (offsets[vb] + vix, v))
                        .collect();
                    let b = row_rhs_sum(&block.rhs[ix]);
                    rows[ix] = Some(push_row(&coeffs, b, true, &mut cols, &mut rhs, &mut cones));
                }
            }
            con_rows.push(rows);
        }
        let mut fix_rows: Vec<Vec<Option<usize>>> = Vec::with_capacity(store.vars.len());
        for (vb, block) in store.vars.iter().enumerate() {
            let mut rows = vec![None; block.n];
            for ix in 0..block.n {
                if let Some(v) = block.fixed[ix] {
                    rows[ix] = Some(push_row(
                        &[(offsets[vb] + ix, 1.0)],
                        v,
                        true,
                        &mut cols,
                        &mut rhs,
                        &mut cones,
                    ));
                }
            }
            fix_rows.push(rows);
        }

        // Inequality section: constraint rows in <= form, then finite bounds.
        // Rows with an infinite nonbinding RHS are deactivated cut slots.
        for (cb, block) in store.cons.iter().enumerate() {
            match block.kind {
                RowKind::Eq => {}
                RowKind::Ge => {
                    for ix in 0..block.n {
                        let b = row_rhs_sum(&block.rhs[ix]);
                        if b == f64::NEG_INFINITY {
                            continue;
                        }
                        let coeffs: Vec<(usize, f64)> = block.coeffs[ix]
                            .iter()
                            .map(|(&(vb, vix), &v)| (offsets[vb] + vix, -v))
                            .collect();
                        con_rows[cb][ix] = Some(push_row(
                            &coeffs, -b, false, &mut cols, &mut rhs, &mut cones,
                        ));
                    }
                }
                RowKind::Le => {
                    for ix in 0..block.n {
                        let b = row_rhs_sum(&block.rhs[ix]);
                        if b == f64::INFINITY {
                            continue;
                        }
                        let coeffs: Vec<(usize, f64)> = block.coeffs[ix]
                            .iter()
                            .map(|(&(vb, vix), &v)| (offsets[vb] + vix, v))
                            .collect();
                        con_rows[cb][ix] = Some(push_row(
                            &coeffs, b, false, &mut cols, &mut rhs, &mut cones,
                        ));
                    }
                }
            }
        }
        for (vb, block) in store.vars.iter().enumerate() {
            for ix in 0..block.n {
                if block.fixed[ix].is_some() {
                    continue; // the fix row replaces the bounds
                }
                let col = offsets[vb] + ix;
                if block.ub[ix].is_finite() {
                    push_row(
                        &[(col, 1.0)],
                        block.ub[ix],
                        false,
                        &mut cols,
                        &mut rhs,
                        &mut cones,
                    );
                }
                if block.lb[ix].is_finite() {
                    push_row(
                        &[(col, -1.0)],
                        -block.lb[ix],
                        false,
                        &mut cols,
                        &mut rhs,
                        &mut cones,
                    );
                }
            }
        }

        // CSC conversion (columns sorted by row index)
        let n_rows = rhs.len();
        let mut col_ptr = Vec::with_capacity(n_cols + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        let mut nnz = 0;
        for col in cols.iter_mut() {
            col_ptr.push(nnz);
            col.sort_by_key(|(r, _)| *r);
            for &(r, v) in col.iter() {
                row_idx.push(r);
                values.push(v);
                nnz += 1;
            }
        }
        col_ptr.push(nnz);
        let a_mat = CscMatrix::new(n_rows, n_cols, col_ptr, row_idx, values);

        // LP: P is the zero matrix
        let p_mat = CscMatrix::new(n_cols, n_cols, vec![0; n_cols + 1], Vec::new(), Vec::new());

        let mut q = vec![0.0; n_cols];
        for (vb, block) in store.vars.iter().enumerate() {
            for ix in 0..block.n {
                q[offsets[vb] + ix] = block.obj[ix];
            }
        }

        let settings = DefaultSettingsBuilder::default()
            .verbose(options.verbose)
            .time_limit(options.time_limit)
            .build()
            .map_err(|e| LpError::SolverFailure {
                status: format!("settings error: {e:?}"),
            })?;

        let mut solver = clarabel::solver::DefaultSolver::new(
            &p_mat, &q, &a_mat, &rhs, &cones, settings,
        )
        .map_err(|e| LpError::SolverFailure {
            status: format!("initialisation failed: {e:?}"),
        })?;

        solver.solve();
        let sol = solver.solution;
        if !matches!(
            sol.status,
            clarabel::solver::SolverStatus::Solved | clarabel::solver::SolverStatus::AlmostSolved
        ) {
            return Err(LpError::SolverFailure {
                status: format!("{:?}", sol.status),
            });
        }
        tracing::debug!(
            rows = n_rows,
            cols = n_cols,
            iterations = sol.iterations,
            "clarabel solved"
        );

        // Write primal values back into the blocks
        for (vb, block) in store.vars.iter_mut().enumerate() {
            for ix in 0..block.n {
                block.values[ix] = sol.x[offsets[vb] + ix];
            }
        }
        // Duals: the convention is marginal objective change per unit RHS
        // increase. Clarabel's strong duality gives obj = -b'z, so equality
        // and <= rows carry -z; negated >= rows carry +z.
        for (cb, block) in store.cons.iter_mut().enumerate() {
            for ix in 0..block.n {
                block.duals[ix] = match con_rows[cb][ix] {
                    Some(row) => match block.kind {
                        RowKind::Ge => sol.z[row],
                        _ => -sol.z[row],
                    },
                    None => 0.0,
                };
            }
            block.rhs_dirty = false;
        }
        for (vb, block) in store.vars.iter_mut().enumerate() {
            for ix in 0..block.n {
                block.fix_duals[ix] = match fix_rows[vb][ix] {
                    Some(row) => -sol.z[row],
                    None => 0.0,
                };
            }
        }
        store.objective = sol.obj_val;
        store.solved = true;
        Ok(())
    }
}
