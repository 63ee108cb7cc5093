//! Buffered coefficient store shared by the solver adapters.
//!
//! The store holds the LP in the named-vector form of the problem contract:
//! variable blocks, constraint blocks, objective coefficients, bounds and
//! per-row additive RHS terms. Adapters flatten it into their backend's
//! matrix form at solve time and write the solution back.

use crate::error::{LpError, LpResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RowKind {
    Eq,
    Ge,
    Le,
}

#[derive(Debug, Clone)]
pub(crate) struct VarBlock {
    pub n: usize,
    pub lb: Vec<f64>,
    pub ub: Vec<f64>,
    pub obj: Vec<f64>,
    pub fixable: Vec<bool>,
    pub fixed: Vec<Option<f64>>,
    pub values: Vec<f64>,
    pub fix_duals: Vec<f64>,
}

impl VarBlock {
    fn new(n: usize) -> Self {
        Self {
            n,
            lb: vec![0.0; n],
            ub: vec![f64::INFINITY; n],
            obj: vec![0.0; n],
            fixable: vec![false; n],
            fixed: vec![None; n],
            values: vec![0.0; n],
            fix_duals: vec![0.0; n],
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ConBlock {
    pub kind: RowKind,
    pub n: usize,
    /// Per row: (var block index, var index) -> coefficient.
    pub coeffs: Vec<HashMap<(usize, usize), f64>>,
    /// Per row: additive RHS keyed by term id.
    pub rhs: Vec<HashMap<String, f64>>,
    pub duals: Vec<f64>,
    pub rhs_dirty: bool,
}

impl ConBlock {
    fn new(kind: RowKind, n: usize) -> Self {
        Self {
            kind,
            n,
            coeffs: vec![HashMap::new(); n],
            rhs: vec![HashMap::new(); n],
            duals: vec![0.0; n],
            rhs_dirty: true,
        }
    }
}

/// The buffered LP.
#[derive(Debug, Default)]
pub struct LpStore {
    pub(crate) var_names: Vec<String>,
    pub(crate) var_index: HashMap<String, usize>,
    pub(crate) vars: Vec<VarBlock>,
    pub(crate) con_names: Vec<String>,
    pub(crate) con_index: HashMap<String, usize>,
    pub(crate) cons: Vec<ConBlock>,
    pub(crate) objective: f64,
    pub(crate) solved: bool,
}

impl LpStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn var_block(&self, id: &str) -> LpResult<&VarBlock> {
        self.var_index
            .get(id)
            .map(|&b| &self.vars[b])
            .ok_or_else(|| LpError::UnknownId(id.to_string()))
    }

    fn var_block_mut(&mut self, id: &str) -> LpResult<&mut VarBlock> {
        match self.var_index.get(id) {
            Some(&b) => Ok(&mut self.vars[b]),
            None => Err(LpError::UnknownId(id.to_string())),
        }
    }

    fn con_block(&self, id: &str) -> LpResult<&ConBlock> {
        self.con_index
            .get(id)
            .map(|&b| &self.cons[b])
            .ok_or_else(|| LpError::UnknownId(id.to_string()))
    }

    fn con_block_mut(&mut self, id: &str) -> LpResult<&mut ConBlock> {
        match self.con_index.get(id) {
            Some(&b) => Ok(&mut self.cons[b]),
            None => Err(LpError::UnknownId(id.to_string())),
        }
    }

    fn check_ix(id: &str, ix: usize, len: usize) -> LpResult<()> {
        if ix >= len {
            return Err(LpError::IndexOutOfRange {
                id: id.to_string(),
                ix,
                len,
            });
        }
        Ok(())
    }

    /// Add a named variable vector. Re-adding with the same length is a no-op.
    pub fn add_var(&mut self, id: &str, n: usize) -> LpResult<()> {
        if let Some(&b) = self.var_index.get(id) {
            let existing = self.vars[b].n;
            if existing != n {
                return Err(LpError::RedefinedId {
                    id: id.to_string(),
                    expected: existing,
                    got: n,
                });
            }
            return Ok(());
        }
        self.var_index.insert(id.to_string(), self.vars.len());
        self.var_names.push(id.to_string());
        self.vars.push(VarBlock::new(n));
        Ok(())
    }

    pub fn add_con(&mut self, id: &str, kind: RowKind, n: usize) -> LpResult<()> {
        if let Some(&b) = self.con_index.get(id) {
            let existing = &self.cons[b];
            if existing.n != n || existing.kind != kind {
                return Err(LpError::RedefinedId {
                    id: id.to_string(),
                    expected: existing.n,
                    got: n,
                });
            }
            return Ok(());
        }
        self.con_index.insert(id.to_string(), self.cons.len());
        self.con_names.push(id.to_string());
        self.cons.push(ConBlock::new(kind, n));
        Ok(())
    }

    pub fn has_var(&self, id: &str) -> bool {
        self.var_index.contains_key(id)
    }

    pub fn has_con(&self, id: &str) -> bool {
        self.con_index.contains_key(id)
    }

    pub fn num_vars(&self, id: &str) -> LpResult<usize> {
        Ok(self.var_block(id)?.n)
    }

    pub fn num_rows(&self, id: &str) -> LpResult<usize> {
        Ok(self.con_block(id)?.n)
    }

    pub fn set_con_coeff(
        &mut self,
        con: &str,
        var: &str,
        con_ix: usize,
        var_ix: usize,
        value: f64,
    ) -> LpResult<()> {
        let &vb = self
            .var_index
            .get(var)
            .ok_or_else(|| LpError::UnknownId(var.to_string()))?;
        Self::check_ix(var, var_ix, self.vars[vb].n)?;
        let block = self.con_block_mut(con)?;
        Self::check_ix(con, con_ix, block.n)?;
        block.coeffs[con_ix].insert((vb, var_ix), value);
        self.solved = false;
        Ok(())
    }

    pub fn get_con_coeff(
        &self,
        con: &str,
        var: &str,
        con_ix: usize,
        var_ix: usize,
    ) -> LpResult<f64> {
        let &vb = self
            .var_index
            .get(var)
            .ok_or_else(|| LpError::UnknownId(var.to_string()))?;
        Self::check_ix(var, var_ix, self.vars[vb].n)?;
        let block = self.con_block(con)?;
        Self::check_ix(con, con_ix, block.n)?;
        Ok(block.coeffs[con_ix].get(&(vb, var_ix)).copied().unwrap_or(0.0))
    }

    pub fn set_obj_coeff(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        let block = self.var_block_mut(var)?;
        Self::check_ix(var, ix, block.n)?;
        block.obj[ix] = value;
        self.solved = false;
        Ok(())
    }

    pub fn get_obj_coeff(&self, var: &str, ix: usize) -> LpResult<f64> {
        let block = self.var_block(var)?;
        Self::check_ix(var, ix, block.n)?;
        Ok(block.obj[ix])
    }

    pub fn set_lb(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        let block = self.var_block_mut(var)?;
        Self::check_ix(var, ix, block.n)?;
        block.lb[ix] = value;
        self.solved = false;
        Ok(())
    }

    pub fn set_ub(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        let block = self.var_block_mut(var)?;
        Self::check_ix(var, ix, block.n)?;
        block.ub[ix] = value;
        self.solved = false;
        Ok(())
    }

    pub fn get_lb(&self, var: &str, ix: usize) -> LpResult<f64> {
        let block = self.var_block(var)?;
        Self::check_ix(var, ix, block.n)?;
        Ok(block.lb[ix])
    }

    pub fn get_ub(&self, var: &str, ix: usize) -> LpResult<f64> {
        let block = self.var_block(var)?;
        Self::check_ix(var, ix, block.n)?;
        Ok(block.ub[ix])
    }

    pub fn set_rhs_term(&mut self, con: &str, term: &str, ix: usize, value: f64) -> LpResult<()> {
        let block = self.con_block_mut(con)?;
        Self::check_ix(con, ix, block.n)?;
        block.rhs[ix].insert(term.to_string(), value);
        block.rhs_dirty = true;
        self.solved = false;
        Ok(())
    }

    pub fn get_rhs_term(&self, con: &str, term: &str, ix: usize) -> LpResult<f64> {
        let block = self.con_block(con)?;
        Self::check_ix(con, ix, block.n)?;
        Ok(block.rhs[ix].get(term).copied().unwrap_or(0.0))
    }

    /// Summed RHS of one row across its terms.
    pub fn row_rhs(&self, con: &str, ix: usize) -> LpResult<f64> {
        let block = self.con_block(con)?;
        Self::check_ix(con, ix, block.n)?;
        Ok(row_rhs_sum(&block.rhs[ix]))
    }

    pub fn make_fixable(&mut self, var: &str, ix: usize) -> LpResult<()> {
        let block = self.var_block_mut(var)?;
        Self::check_ix(var, ix, block.n)?;
        block.fixable[ix] = true;
        Ok(())
    }

    pub fn fix(&mut self, var: &str, ix: usize, value: f64) -> LpResult<()> {
        let block = self.var_block_mut(var)?;
        Self::check_ix(var, ix, block.n)?;
        if !block.fixable[ix] {
            return Err(LpError::FixUnfixable {
                id: var.to_string(),
                ix,
            });
        }
        block.fixed[ix] = Some(value);
        self.solved = false;
        Ok(())
    }

    pub fn unfix(&mut self, var: &str, ix: usize) -> LpResult<()> {
        let block = self.var_block_mut(var)?;
        Self::check_ix(var, ix, block.n)?;
        if !block.fixable[ix] {
            return Err(LpError::FixUnfixable {
                id: var.to_string(),
                ix,
            });
        }
        block.fixed[ix] = None;
        self.solved = false;
        Ok(())
    }

    pub fn get_var_value(&self, var: &str, ix: usize) -> LpResult<f64> {
        if !self.solved {
            return Err(LpError::NotSolved);
        }
        let block = self.var_block(var)?;
        Self::check_ix(var, ix, block.n)?;
        Ok(block.values[ix])
    }

    pub fn get_con_dual(&self, con: &str, ix: usize) -> LpResult<f64> {
        if !self.solved {
            return Err(LpError::NotSolved);
        }
        let block = self.con_block(con)?;
        Self::check_ix(con, ix, block.n)?;
        Ok(block.duals[ix])
    }

    pub fn get_fix_var_dual(&self, var: &str, ix: usize) -> LpResult<f64> {
        if !self.solved {
            return Err(LpError::NotSolved);
        }
        let block = self.var_block(var)?;
        Self::check_ix(var, ix, block.n)?;
        if block.fixed[ix].is_none() {
            return Err(LpError::FixUnfixable {
                id: var.to_string(),
                ix,
            });
        }
        Ok(block.fix_duals[ix])
    }

    pub fn get_objective_value(&self) -> LpResult<f64> {
        if !self.solved {
            return Err(LpError::NotSolved);
        }
        Ok(self.objective)
    }

    /// Number of structural columns across all variable blocks.
    pub(crate) fn num_cols(&self) -> usize {
        self.vars.iter().map(|b| b.n).sum()
    }

    /// Per-block column offsets in flattening order.
    pub(crate) fn col_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.vars.len());
        let mut acc = 0;
        for block in &self.vars {
            offsets.push(acc);
            acc += block.n;
        }
        offsets
    }
}

pub(crate) fn row_rhs_sum(terms: &HashMap<String, f64>) -> f64 {
    terms.values().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_var_idempotent() {
        let mut store = LpStore::new();
        store.add_var("x", 3).unwrap();
        store.add_var("x", 3).unwrap();
        assert_eq!(store.num_vars("x").unwrap(), 3);
        assert!(matches!(
            store.add_var("x", 4),
            Err(LpError::RedefinedId { .. })
        ));
    }

    #[test]
    fn test_unknown_and_out_of_range() {
        let mut store = LpStore::new();
        store.add_var("x", 2).unwrap();
        store.add_con("c", RowKind::Eq, 2).unwrap();
        assert!(matches!(
            store.set_obj_coeff("y", 0, 1.0),
            Err(LpError::UnknownId(_))
        ));
        assert!(matches!(
            store.set_con_coeff("c", "x", 5, 0, 1.0),
            Err(LpError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_rhs_terms_additive_per_term() {
        let mut store = LpStore::new();
        store.add_con("c", RowKind::Eq, 1).unwrap();
        store.set_rhs_term("c", "demand", 0, 100.0).unwrap();
        store.set_rhs_term("c", "inflow", 0, -20.0).unwrap();
        assert_eq!(store.row_rhs("c", 0).unwrap(), 80.0);
        // Overwriting a term replaces just that summand
        store.set_rhs_term("c", "demand", 0, 50.0).unwrap();
        assert_eq!(store.row_rhs("c", 0).unwrap(), 30.0);
        assert_eq!(store.get_rhs_term("c", "inflow", 0).unwrap(), -20.0);
    }

    #[test]
    fn test_fix_requires_fixable() {
        let mut store = LpStore::new();
        store.add_var("x", 1).unwrap();
        assert!(matches!(
            store.fix("x", 0, 1.0),
            Err(LpError::FixUnfixable { .. })
        ));
        store.make_fixable("x", 0).unwrap();
        store.fix("x", 0, 1.0).unwrap();
        store.unfix("x", 0).unwrap();
    }

    #[test]
    fn test_values_require_solve() {
        let mut store = LpStore::new();
        store.add_var("x", 1).unwrap();
        assert!(matches!(
            store.get_var_value("x", 0),
            Err(LpError::NotSolved)
        ));
    }
}
