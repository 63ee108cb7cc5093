//! Error types at the LP backend boundary.

use thiserror::Error;

/// Errors raised by the problem contract and its solver adapters.
#[derive(Error, Debug)]
pub enum LpError {
    /// A variable or constraint id that was never added
    #[error("Unknown id: {0}")]
    UnknownId(String),

    /// Index outside a named vector
    #[error("Index {ix} out of range for '{id}' of length {len}")]
    IndexOutOfRange { id: String, ix: usize, len: usize },

    /// An id re-added with a different length (builds are idempotent)
    #[error("Id '{id}' redefined with length {got}, previously {expected}")]
    RedefinedId {
        id: String,
        expected: usize,
        got: usize,
    },

    /// Fixing a variable index that was not made fixable
    #[error("Variable '{id}'[{ix}] is not fixable")]
    FixUnfixable { id: String, ix: usize },

    /// The adapter does not implement this query
    #[error("Unsupported by this backend: {0}")]
    Unsupported(String),

    /// Solution values queried before a successful solve
    #[error("Problem has not been solved")]
    NotSolved,

    /// The backend terminated non-optimally, even after one retry
    #[error("Solver failure: {status}")]
    SolverFailure { status: String },
}

/// Convenience type alias for Results using LpError.
pub type LpResult<T> = Result<T, LpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_id() {
        let err = LpError::IndexOutOfRange {
            id: "Flow.Gas".into(),
            ix: 9,
            len: 4,
        };
        let text = err.to_string();
        assert!(text.contains("Flow.Gas"));
        assert!(text.contains('9'));
    }
}
