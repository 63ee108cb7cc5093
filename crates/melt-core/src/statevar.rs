//! State variables: the carry-over discipline.
//!
//! A state variable is the pair of LP positions holding a quantity that
//! crosses the horizon boundary: the ingoing `x[0]` (a dedicated, fixable,
//! length-1 variable) and the outgoing `x[T]` (the last index of the main
//! vector). Boundary conditions constrain these pairs; Benders-style cuts
//! read the fix-variable dual of the ingoing half.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position inside a named LP vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarRef {
    pub name: String,
    pub ix: usize,
}

impl VarRef {
    pub fn new(name: impl Into<String>, ix: usize) -> Self {
        Self {
            name: name.into(),
            ix,
        }
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.ix)
    }
}

/// The `(var_in, var_out)` pair of one carry-over quantity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateVariableInfo {
    pub var_in: VarRef,
    pub var_out: VarRef,
}

impl StateVariableInfo {
    pub fn new(var_in: VarRef, var_out: VarRef) -> Self {
        Self { var_in, var_out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_variable_is_map_key_material() {
        use std::collections::HashMap;
        let s = StateVariableInfo::new(
            VarRef::new("Storage.Res_start", 0),
            VarRef::new("Storage.Res", 51),
        );
        let mut map = HashMap::new();
        map.insert(s.clone(), 1.0);
        assert_eq!(map[&s], 1.0);
        assert_eq!(s.var_in.to_string(), "Storage.Res_start[0]");
    }
}
